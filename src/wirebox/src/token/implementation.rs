use std::any::{self, TypeId};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;

use crate::token::Token;

pub struct TypeToken<T: 'static> {
    _marker: PhantomData<T>,
}

impl<T: 'static> TypeToken<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: 'static> Clone for TypeToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for TypeToken<T> {}

// SAFETY: `TypeToken<T>` doesn't actually contain a `T`.
unsafe impl<T: 'static> Send for TypeToken<T> {}

// SAFETY: `TypeToken<T>` doesn't actually contain a `T`.
unsafe impl<T: 'static> Sync for TypeToken<T> {}

impl<T: 'static> Debug for TypeToken<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl<T: 'static> Display for TypeToken<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", any::type_name::<T>())
    }
}

impl<T: 'static> Token for TypeToken<T> {
    fn target_type(&self) -> Option<TypeId> {
        Some(TypeId::of::<T>())
    }

    fn dyn_clone(&self) -> Box<dyn Token> {
        Box::new(*self)
    }

    fn dyn_eq(&self, other: &dyn Token) -> bool {
        other.as_any().is::<Self>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedToken {
    name: &'static str,
}

impl NamedToken {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Display for NamedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name)
    }
}

impl Token for NamedToken {
    fn target_type(&self) -> Option<TypeId> {
        None
    }

    fn dyn_clone(&self) -> Box<dyn Token> {
        Box::new(*self)
    }

    fn dyn_eq(&self, other: &dyn Token) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self.name == other.name)
    }
}
