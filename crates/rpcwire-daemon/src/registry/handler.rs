//! The handler contract.
//!
//! A handler is an async function taking the call [`Context`] first and at
//! most one parameter after it, resolving to `Result<R, E>`. Other shapes do
//! not implement [`Handler`] and are rejected by the compiler:
//!
//! ```compile_fail
//! use rpcwire_daemon::Server;
//!
//! // the context must come first
//! async fn missing_context(name: String) -> Result<String, rpcwire_core::ProtocolError> {
//!     Ok(name)
//! }
//!
//! Server::new().register("greet", missing_context).unwrap();
//! ```
//!
//! ```compile_fail
//! use rpcwire_daemon::{Context, Server};
//!
//! // exactly (result, error) must be returned
//! async fn bare_result(_ctx: Context) -> String {
//!     String::new()
//! }
//!
//! Server::new().register("bare", bare_result).unwrap();
//! ```
//!
//! ```compile_fail
//! use rpcwire_daemon::{Context, Server};
//!
//! // only one parameter after the context
//! async fn two_params(_ctx: Context, a: i64, b: i64) -> Result<i64, rpcwire_core::ProtocolError> {
//!     Ok(a + b)
//! }
//!
//! Server::new().register("add", two_params).unwrap();
//! ```

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;

use super::{ParamShape, ShapeError};
use crate::context::Context;
use crate::dispatch::{bind_params, complete, DispatchError, ZeroValuePolicy};

pub type InvokeFuture = BoxFuture<'static, Result<Box<RawValue>, DispatchError>>;

/// Type-erased bind-decode-invoke-encode closure stored in a descriptor.
pub type Invoker =
    Arc<dyn Fn(Context, Option<Box<RawValue>>) -> InvokeFuture + Send + Sync>;

/// Implemented for `Fn(Context) -> Fut` and `Fn(Context, P) -> Fut` where
/// `Fut` resolves to `Result<R, E>`.
///
/// `Args` only disambiguates the two shapes; callers never name it.
pub trait Handler<Args>: Send + Sync + Sized + 'static {
    fn param_shape() -> ParamShape;

    fn result_type() -> &'static str;

    /// Registration-time checks the trait bounds cannot express.
    fn probe() -> Result<(), ShapeError> {
        Ok(())
    }

    fn into_invoker(self, policy: ZeroValuePolicy) -> Invoker;
}

impl<F, Fut, R, E> Handler<(Context,)> for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Serialize + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn param_shape() -> ParamShape {
        ParamShape::None
    }

    fn result_type() -> &'static str {
        type_name::<R>()
    }

    fn into_invoker(self, _policy: ZeroValuePolicy) -> Invoker {
        Arc::new(move |ctx: Context, _params: Option<Box<RawValue>>| {
            let call = (self)(ctx);
            async move { complete(call.await) }.boxed()
        })
    }
}

impl<F, Fut, P, R, E> Handler<(Context, P)> for F
where
    F: Fn(Context, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    P: DeserializeOwned + Serialize + Default + PartialEq + Send + 'static,
    R: Serialize + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn param_shape() -> ParamShape {
        ParamShape::Required {
            type_name: type_name::<P>(),
        }
    }

    fn result_type() -> &'static str {
        type_name::<R>()
    }

    /// The zero value must survive a trip through JSON, otherwise wire data
    /// has no concrete destination to decode into.
    fn probe() -> Result<(), ShapeError> {
        let unbindable = |reason: String| ShapeError::UnbindableParameter {
            type_name: type_name::<P>(),
            reason,
        };
        let zero = serde_json::to_value(P::default()).map_err(|e| unbindable(e.to_string()))?;
        serde_json::from_value::<P>(zero).map_err(|e| unbindable(e.to_string()))?;
        Ok(())
    }

    fn into_invoker(self, policy: ZeroValuePolicy) -> Invoker {
        Arc::new(move |ctx: Context, params: Option<Box<RawValue>>| {
            match bind_params::<P>(params.as_deref(), policy) {
                Ok(param) => {
                    let call = (self)(ctx, param);
                    async move { complete(call.await) }.boxed()
                }
                Err(e) => future::ready(Err(e)).boxed(),
            }
        })
    }
}
