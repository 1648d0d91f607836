mod display;

pub use display::{print_assistant, print_error, print_header, print_prompt, print_success};
