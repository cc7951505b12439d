pub mod controller;
pub mod job_service;
pub mod task_dispatcher;

pub use controller::ScheduleController;
pub use job_service::JobService;
pub use task_dispatcher::TaskDispatcher;
