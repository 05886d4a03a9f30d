mod guild;
mod health;

pub(crate) use guild::{
    clear, connect, currently_playing, disconnect, enqueue, get_queue, pause, remove_from_queue,
    resume, skip, stop,
};
pub(crate) use health::readiness_check;
