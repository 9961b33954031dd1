//! 工具箱：web_search / scrape / cite 与统一执行器

pub mod cite;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scrape;
pub mod search;

pub use cite::CiteTool;
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry};
pub use scrape::ScrapeTool;
pub use search::WebSearchTool;
