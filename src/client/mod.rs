mod bootstrap;
mod launcher;
pub(crate) mod rendezvous;
mod thread_comm;

pub use launcher::ThreadGroup;
pub use thread_comm::ThreadComm;
