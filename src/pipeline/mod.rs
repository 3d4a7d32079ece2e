//! 编排流水线：路由 → 计划规范化 → 顺序执行 → 答案合成

pub mod answer;
pub mod events;
pub mod executor;
pub mod image;
pub mod intent;
pub mod plan;
pub mod router;

pub use answer::{collect_images, extract_inline_images, pick_final_answer, InlineImageExtraction};
pub use events::{ProgressEvent, ProgressSender};
pub use executor::{ExecutionRequest, Executor, ExecutorContext, ToolRunOutput};
pub use image::{parse_image_input, ImageInput, RawImage};
pub use intent::Intent;
pub use plan::{normalize, Plan, PlanProgressStep, PlanStep};
pub use router::{RouteResult, Router};
