#![allow(clippy::new_without_default)]

pub mod context;
pub mod scope;
pub mod token;
pub mod wrapper;
mod util;

pub use util::any::{AsAny, DowncastArc};

pub mod prelude {
    pub use crate::context::{ContextId, STATIC_CONTEXT};
    pub use crate::scope::Scope;
    pub use crate::token;
    pub use crate::wrapper::{
        Acquisition, DoneSignal, HostRef, Injectable, Instance, InstancePerContext, InstanceRef,
        InstanceWrapper, Metatype, PropertyMetadata, ResolutionError, WrapperId, WrapperSettings,
    };
    pub use crate::{AsAny, DowncastArc};
}
