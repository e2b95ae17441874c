//! # Autowire: Dependency Injection Container for Rust
//!
//! A runtime IoC container that builds objects by reading what their
//! constructors declare. Classes are described once with
//! [`ClassDescriptor`](autowire_container::descriptor::ClassDescriptor);
//! the container resolves every class-typed constructor parameter on its
//! own and only needs to be told about interfaces, scalars and exceptions.
//!
//! ```rust
//! use autowire::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! struct Greeter {
//!     clock: Arc<Clock>,
//!     greeting: String,
//! }
//!
//! let container = Container::builder()
//!     .define(ClassDescriptor::class::<Clock>("Clock").default_constructor())
//!     .define(
//!         ClassDescriptor::class::<Greeter>("Greeter")
//!             .needs("clock", "Clock")
//!             .parameter(ParameterDescriptor::typed("greeting", "string").with_default("hello"))
//!             .constructor(|args| {
//!                 Ok(Greeter { clock: args.object(0)?, greeting: args.string(1)? })
//!             }),
//!     )
//!     .build();
//!
//! container.singleton_self("Clock").unwrap();
//! container.when("Greeter").needs("$greeting").give(Implementation::value("hi")).unwrap();
//!
//! let greeter = container.resolve::<Greeter>("Greeter").unwrap();
//! assert_eq!(greeter.greeting, "hi");
//! assert!(Arc::ptr_eq(&greeter.clock, &container.resolve::<Clock>("Clock").unwrap()));
//! ```

pub use autowire_container::*;
pub use autowire_support::*;
