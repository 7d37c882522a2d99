//! Built-in producer and filter implementations.

pub mod echo;
pub mod text;
pub mod timer;

pub use echo::EchoFilter;
pub use text::{TextFilter, TextMode};
pub use timer::TimerProducer;
