pub use anyhow::{
    anyhow,
    bail,
    ensure,
};
pub use paste::paste;
pub use thiserror::Error;

pub type EmptyResult = anyhow::Result<()>;

// This macro creates an enum which derives from thiserror::Error, and also creates constructor
// functions in snake case for each of the enum variants; the constructors return anyhow::Error so
// call sites can bail! without wrapping.
#[macro_export]
macro_rules! err_impl {
    (@hidden $errtype:ident, $item:ident) => {
        paste! {
            pub(crate) fn [<$item:snake>](in_: &str) -> anyhow::Error {
                anyhow!{$errtype::$item(in_.into())}
            }
        }
    };

    ($errtype:ident,
        $(#[$errinfo:meta] $item:ident(String),)+
    ) => {
        #[derive(Debug, Error)]
        pub(crate) enum $errtype {
            $(#[$errinfo] $item(String)),+
        }

        impl $errtype {
            $(err_impl! {@hidden $errtype, $item})+
        }
    };
}

pub use err_impl;
