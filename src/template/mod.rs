mod placeholders;
mod render;

pub use placeholders::extract_placeholder_names;
pub use render::{check_syntax, TemplateRenderer};
