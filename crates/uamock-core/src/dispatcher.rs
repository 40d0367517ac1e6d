//! Method Dispatcher
//!
//! Maps method node ids to typed handler bindings and invokes them on remote
//! request.
//!
//! ## Dispatch pipeline
//!
//! 1. Resolve the binding (qualified id or bare browse name)
//! 2. Check argument count and per-position variant against the declared
//!    input types
//! 3. Run the handler with the owning object and the arguments
//! 4. Check the returned results against the declared output types
//!
//! Bindings are immutable once the dispatcher is shared, so a call only
//! clones an `Arc` before running the handler: a slow handler (Reboot) never
//! blocks other calls or registry access.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    DispatchError, HandlerError, NodeId, NodeRegistry, Value, ValueType,
    registry::{NodeKind, QualifiedName},
};

/// What passed to a handler besides its arguments.
#[derive(Clone, Copy)]
pub struct MethodContext<'a> {
    /// Object the method is attached to.
    pub object: &'a NodeId,
    /// The method being invoked.
    pub method: &'a NodeId,
    /// The shared address space.
    pub registry: &'a NodeRegistry,
}

/// Implementation bound to a method node.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the method. Arguments are already checked against the declared
    /// input types.
    async fn call(&self, ctx: MethodContext<'_>, args: Vec<Value>)
    -> Result<Vec<Value>, HandlerError>;
}

/// Declared input and output types of a method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSignature {
    /// Expected argument types, in order.
    pub inputs: Vec<ValueType>,
    /// Result types, in order.
    pub outputs: Vec<ValueType>,
}

impl MethodSignature {
    /// Create a signature.
    pub fn new(inputs: impl Into<Vec<ValueType>>, outputs: impl Into<Vec<ValueType>>) -> Self {
        Self { inputs: inputs.into(), outputs: outputs.into() }
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[ValueType]| {
            types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        };
        write!(f, "({}) -> ({})", join(&self.inputs), join(&self.outputs))
    }
}

/// Why arguments were rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentFault {
    /// Fewer arguments than declared inputs.
    Missing {
        /// Declared input count.
        expected: usize,
        /// Arguments supplied.
        actual: usize,
    },
    /// More arguments than declared inputs.
    TooMany {
        /// Declared input count.
        expected: usize,
        /// Arguments supplied.
        actual: usize,
    },
    /// Argument at `position` has the wrong variant.
    WrongType {
        /// Zero-based argument index.
        position: usize,
        /// Declared type.
        expected: ValueType,
        /// Supplied type.
        actual: ValueType,
    },
}

impl fmt::Display for ArgumentFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { expected, actual } => {
                write!(f, "expected {expected} arguments, got {actual}")
            },
            Self::TooMany { expected, actual } => {
                write!(f, "expected {expected} arguments, got {actual}")
            },
            Self::WrongType { position, expected, actual } => {
                write!(f, "argument {position}: expected {expected}, got {actual}")
            },
        }
    }
}

/// A method node bound to its handler.
pub struct MethodBinding {
    method: NodeId,
    object: NodeId,
    browse_name: String,
    signature: MethodSignature,
    handler: Arc<dyn MethodHandler>,
}

impl MethodBinding {
    /// Method node id.
    pub fn method(&self) -> &NodeId {
        &self.method
    }

    /// Owning object.
    pub fn object(&self) -> &NodeId {
        &self.object
    }

    /// Browse name of the method node.
    pub fn browse_name(&self) -> &str {
        &self.browse_name
    }

    /// Declared signature.
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    fn check_arguments(&self, args: &[Value]) -> Result<(), ArgumentFault> {
        let expected = self.signature.inputs.len();
        let actual = args.len();
        if actual < expected {
            return Err(ArgumentFault::Missing { expected, actual });
        }
        if actual > expected {
            return Err(ArgumentFault::TooMany { expected, actual });
        }
        for (position, (declared, arg)) in self.signature.inputs.iter().zip(args).enumerate() {
            if arg.value_type() != *declared {
                return Err(ArgumentFault::WrongType {
                    position,
                    expected: *declared,
                    actual: arg.value_type(),
                });
            }
        }
        Ok(())
    }

    fn check_results(&self, results: &[Value]) -> Result<(), DispatchError> {
        let actual: Vec<ValueType> = results.iter().map(Value::value_type).collect();
        if actual != self.signature.outputs {
            return Err(DispatchError::ContractViolation {
                method: self.method.clone(),
                expected: self.signature.outputs.clone(),
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("method", &self.method)
            .field("object", &self.object)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Table of method bindings over a shared registry.
pub struct MethodDispatcher {
    registry: Arc<NodeRegistry>,
    bindings: HashMap<NodeId, Arc<MethodBinding>>,
}

impl MethodDispatcher {
    /// Create an empty dispatcher over `registry`.
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self { registry, bindings: HashMap::new() }
    }

    /// The registry handlers operate on.
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Create a method node under `object` and bind `handler` to it.
    ///
    /// # Errors
    ///
    /// `DispatchError::Registry` if the method node cannot be created
    /// (missing or non-object parent, duplicate name).
    pub fn bind(
        &mut self,
        object: &NodeId,
        name: QualifiedName,
        signature: MethodSignature,
        handler: impl MethodHandler + 'static,
    ) -> Result<NodeId, DispatchError> {
        let browse_name = name.name.clone();
        let method = self.registry.create_node(object, NodeKind::Method, name, None)?;

        tracing::debug!("Bound method {} {}", method, signature);
        self.bindings.insert(
            method.clone(),
            Arc::new(MethodBinding {
                method: method.clone(),
                object: object.clone(),
                browse_name,
                signature,
                handler: Arc::new(handler),
            }),
        );
        Ok(method)
    }

    /// Binding for an exact method id.
    pub fn binding(&self, method: &NodeId) -> Option<&Arc<MethodBinding>> {
        self.bindings.get(method)
    }

    /// All bindings, sorted by method id.
    pub fn bindings(&self) -> Vec<Arc<MethodBinding>> {
        let mut all: Vec<_> = self.bindings.values().cloned().collect();
        all.sort_by(|a, b| a.method.cmp(&b.method));
        all
    }

    /// Resolve a method given its qualified id (`ns=2;s=AddNumbers`) or a
    /// bare browse name (`AddNumbers`).
    ///
    /// # Errors
    ///
    /// `MethodNotFound` if nothing matches or a browse name is ambiguous.
    pub fn resolve(&self, name: &str) -> Result<Arc<MethodBinding>, DispatchError> {
        if let Ok(id) = name.parse::<NodeId>() {
            if let Some(binding) = self.bindings.get(&id) {
                return Ok(Arc::clone(binding));
            }
        }

        let mut matches = self.bindings.values().filter(|b| b.browse_name == name);
        match (matches.next(), matches.next()) {
            (Some(binding), None) => Ok(Arc::clone(binding)),
            _ => Err(DispatchError::MethodNotFound(name.to_string())),
        }
    }

    /// Invoke `method` with positional `args`.
    ///
    /// # Errors
    ///
    /// - `MethodNotFound` if no binding exists
    /// - `ArgumentMismatch` if arity or a variant does not match
    /// - `HandlerFailed` if the handler reports failure
    /// - `ContractViolation` if results do not match the declared outputs
    pub async fn call(&self, method: &NodeId, args: Vec<Value>) -> Result<Vec<Value>, DispatchError> {
        let binding = self
            .bindings
            .get(method)
            .cloned()
            .ok_or_else(|| DispatchError::MethodNotFound(method.to_string()))?;
        self.invoke(&binding, args).await
    }

    /// Invoke `method`, additionally checking it belongs to `object`.
    ///
    /// # Errors
    ///
    /// As [`call`](Self::call); a method owned by another object is
    /// `MethodNotFound`.
    pub async fn call_on(
        &self,
        object: &NodeId,
        method: &NodeId,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, DispatchError> {
        let binding = self
            .bindings
            .get(method)
            .filter(|b| b.object == *object)
            .cloned()
            .ok_or_else(|| DispatchError::MethodNotFound(format!("{method} on {object}")))?;
        self.invoke(&binding, args).await
    }

    async fn invoke(
        &self,
        binding: &MethodBinding,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, DispatchError> {
        binding.check_arguments(&args).map_err(|fault| DispatchError::ArgumentMismatch {
            method: binding.method.clone(),
            fault,
        })?;

        let ctx = MethodContext {
            object: &binding.object,
            method: &binding.method,
            registry: self.registry.as_ref(),
        };

        let results = match binding.handler.call(ctx, args).await {
            Ok(results) => results,
            Err(source) => {
                tracing::warn!("Method {} failed: {}", binding.method, source);
                return Err(DispatchError::HandlerFailed { method: binding.method.clone(), source });
            },
        };

        if let Err(e) = binding.check_results(&results) {
            tracing::error!("{}", e);
            return Err(e);
        }

        Ok(results)
    }
}

impl fmt::Debug for MethodDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDispatcher").field("binding_count", &self.bindings.len()).finish()
    }
}

/// Adapter turning an async closure into a [`MethodHandler`].
///
/// The closure receives the owning object id and the arguments. It must own
/// whatever it captures.
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a closure as a handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(NodeId, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Vec<Value>, HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(NodeId, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Vec<Value>, HandlerError>> + Send + 'static,
{
    async fn call(
        &self,
        ctx: MethodContext<'_>,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, HandlerError> {
        (self.f)(ctx.object.clone(), args).await
    }
}
