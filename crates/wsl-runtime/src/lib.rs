pub mod engine;

mod helpers {
    pub(crate) mod substitute;
}

pub use engine::*;
