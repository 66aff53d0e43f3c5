mod pipeline;
mod scan;
pub mod util;
