//! Define-call classification.
//!
//! The loader's `define` is variadic: name, dependency list, and body are
//! all optional or positional. Observed calls arrive as a [`DefineArg`]
//! vector and are normalized here into a [`DefineCall`] so the rest of
//! the interceptor works with one shape.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{LoaderError, LoaderResult};

/// Module factory registered with the loader. Invoked later with the
/// resolved imports for its declared dependency list, one entry per
/// declared name, in declaration order.
pub trait FactoryLike: Send + Sync {
    fn invoke(&self, imports: Vec<FactoryImport>) -> LoaderResult<Value>;
}

/// One resolved import handed to a factory.
#[derive(Clone)]
pub enum FactoryImport {
    /// A dynamic-import facade (`require`, `Loader/Library`,
    /// `Loader/ModuleStubs`), callable from inside the factory body.
    Facade(Arc<dyn ImportFacade>),
    /// An ordinary module export.
    Value(Value),
}

/// Loader-provided callable that loads further modules on demand.
pub trait ImportFacade: Send + Sync {
    fn load(&self, targets: &[String]) -> LoaderResult<()>;
    /// The dependency name this facade was resolved for.
    fn name(&self) -> &str;
}

/// One positional argument of an observed define call.
#[derive(Clone)]
pub enum DefineArg {
    /// Module name
    Text(String),
    /// Dependency list
    List(Vec<String>),
    /// Callable factory body
    Factory(Arc<dyn FactoryLike>),
    /// Object-literal body; the module needs no execution step
    Data(Value),
}

impl fmt::Debug for DefineArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineArg::Text(name) => f.debug_tuple("Text").field(name).finish(),
            DefineArg::List(deps) => f.debug_tuple("List").field(deps).finish(),
            DefineArg::Factory(_) => f.write_str("Factory(..)"),
            DefineArg::Data(value) => f.debug_tuple("Data").field(value).finish(),
        }
    }
}

/// Argument arrangement of a recognized define call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineShape {
    /// `define(factory)`
    Bare,
    /// `define(name, factory)`
    NamedFactory,
    /// `define(deps, factory)`
    ListedAnonymous,
    /// `define(name, deps, factory)`
    Full,
    /// `define(name, data)` or `define(name, deps, data)`
    ObjectLiteral,
}

/// Normalized form of a define call.
#[derive(Debug, Clone)]
pub struct DefineCall {
    pub name: Option<String>,
    pub deps: Vec<String>,
    pub body: DefineBody,
}

/// Module body, callable or plain data.
#[derive(Clone)]
pub enum DefineBody {
    Factory(Arc<dyn FactoryLike>),
    Object(Value),
}

impl fmt::Debug for DefineBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineBody::Factory(_) => f.write_str("Factory(..)"),
            DefineBody::Object(value) => f.debug_tuple("Object").field(value).finish(),
        }
    }
}

impl DefineBody {
    pub fn is_object(&self) -> bool {
        matches!(self, DefineBody::Object(_))
    }
}

/// Classifies an observed argument vector into one of the five
/// recognized shapes.
pub fn classify(args: &[DefineArg]) -> LoaderResult<(DefineShape, DefineCall)> {
    use DefineArg as A;

    let unrecognized = || LoaderError::UnrecognizedShape(args.len());

    match args {
        [A::Factory(factory)] => Ok((
            DefineShape::Bare,
            DefineCall {
                name: None,
                deps: Vec::new(),
                body: DefineBody::Factory(Arc::clone(factory)),
            },
        )),
        [A::Text(name), A::Factory(factory)] => Ok((
            DefineShape::NamedFactory,
            DefineCall {
                name: Some(name.clone()),
                deps: Vec::new(),
                body: DefineBody::Factory(Arc::clone(factory)),
            },
        )),
        [A::List(deps), A::Factory(factory)] => Ok((
            DefineShape::ListedAnonymous,
            DefineCall {
                name: None,
                deps: deps.clone(),
                body: DefineBody::Factory(Arc::clone(factory)),
            },
        )),
        [A::Text(name), A::List(deps), A::Factory(factory)] => Ok((
            DefineShape::Full,
            DefineCall {
                name: Some(name.clone()),
                deps: deps.clone(),
                body: DefineBody::Factory(Arc::clone(factory)),
            },
        )),
        [A::Text(name), A::Data(value)] => Ok((
            DefineShape::ObjectLiteral,
            DefineCall {
                name: Some(name.clone()),
                deps: Vec::new(),
                body: DefineBody::Object(value.clone()),
            },
        )),
        [A::Text(name), A::List(deps), A::Data(value)] => Ok((
            DefineShape::ObjectLiteral,
            DefineCall {
                name: Some(name.clone()),
                deps: deps.clone(),
                body: DefineBody::Object(value.clone()),
            },
        )),
        _ => Err(unrecognized()),
    }
}
