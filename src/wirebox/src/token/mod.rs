mod implementation;

use std::any::TypeId;
use std::fmt::{Debug, Display};

use crate::util::any::AsAny;

use crate::token::implementation::{NamedToken, TypeToken};

/// A symbolic designator of an injectable component, as it appears in a
/// component's declared injection list.
///
/// A [`Token`] is purely symbolic: this crate stores a wrapper's tokens in
/// declaration order and hands them back on request, while resolving a token
/// to the wrapper it designates is the job of the surrounding module
/// registry. A token either names a concrete type (see [`of`]) or an
/// arbitrary string label (see [`named`]).
pub trait Token
where
    Self: Debug + Display + AsAny + Send + Sync + 'static,
{
    /// Returns the [`TypeId`] of the designated type, or [`None`] if the
    /// token is a plain label without an associated type.
    fn target_type(&self) -> Option<TypeId>;

    fn dyn_clone(&self) -> Box<dyn Token>;

    fn dyn_eq(&self, other: &dyn Token) -> bool;
}

impl PartialEq for dyn Token {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

impl Eq for dyn Token {}

/// Creates a token designating the type `T`.
pub fn of<T: 'static>() -> impl Token {
    TypeToken::<T>::new()
}

/// Creates a token designating an arbitrary string label.
pub fn named(name: &'static str) -> impl Token {
    NamedToken::new(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_target_type_succeeds() {
        let i32_token: Box<dyn Token> = Box::new(of::<i32>());
        let named_token: Box<dyn Token> = Box::new(named("config"));

        assert_eq!(i32_token.target_type(), Some(TypeId::of::<i32>()));
        assert_eq!(named_token.target_type(), None);
    }

    #[test]
    fn token_eq_succeeds() {
        let i32_token: Box<dyn Token> = Box::new(of::<i32>());
        let str_token: Box<dyn Token> = Box::new(of::<&'static str>());
        let name1_token: Box<dyn Token> = Box::new(named("name1"));
        let name2_token: Box<dyn Token> = Box::new(named("name2"));

        assert_eq!(&i32_token, &i32_token.dyn_clone());
        assert_ne!(&i32_token, &str_token);
        assert_eq!(&name1_token, &name1_token.dyn_clone());
        assert_ne!(&name1_token, &name2_token);
        assert_ne!(&i32_token, &name1_token);
    }

    #[test]
    fn token_display_succeeds() {
        assert_eq!(of::<i32>().to_string(), "i32");
        assert_eq!(named("config").to_string(), "config");
    }
}
