pub mod engine_service;
pub mod scheduler;

pub use engine_service::SocialEngine;
pub use scheduler::Scheduler;
