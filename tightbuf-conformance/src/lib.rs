//! The conformance schema compiled under each generator configuration.
//!
//! Every variant is laid out the way a user crate includes generated code:
//! one module per package, siblings under a common parent.

macro_rules! generated {
    ($(#[$attr:meta])* $variant:ident, $dir:literal) => {
        $(#[$attr])*
        pub mod $variant {
            pub mod conf {
                include!(concat!(env!("OUT_DIR"), "/", $dir, "/conf.rs"));
            }
        }
    };
}

generated!(declaration, "declaration");
generated!(ascending, "ascending");
generated!(unordered, "unordered");
generated!(
    /// Getters assert presence and no `try_*` accessors are generated.
    strict,
    "strict"
);
