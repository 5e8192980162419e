//! Service layer: the event coordination core and the assistant services
//! its handlers call into.

pub mod builtin_handlers;
pub mod event_dispatcher;
pub mod event_loop;
pub mod event_queue;
pub mod event_scheduler;
pub mod response_service;
pub mod summary_service;

pub use builtin_handlers::{
    AutonomousCheckHandler, ChannelSyncHandler, MessageHandler, SummaryHandler,
};
pub use event_dispatcher::{handler_fn, DispatchOutcome, EventDispatcher, EventHandler, FnHandler};
pub use event_loop::EventLoop;
pub use event_queue::EventQueue;
pub use event_scheduler::EventScheduler;
pub use response_service::{parse_verdict, ResponseService, Verdict};
pub use summary_service::SummaryService;
