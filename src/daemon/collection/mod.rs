//! Everything that observes the user: the [recorder::EventRecorder] state machine and the
//! [activation::ActivationWatcher] that tells it when the foreground application changes.

pub mod activation;
pub mod idle;
pub mod recorder;
