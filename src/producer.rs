/*
Copyright 2024 Google LLC

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use thiserror::Error;

use crate::Provider;

/// Failure of an asynchronous production binding.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("production failed: {message}")]
pub struct ProductionError {
    message: String,
}

impl ProductionError {
    pub fn new(message: impl Into<String>) -> Self {
        ProductionError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result wrapper handed to `Produced<T>` requests; failures propagate only
/// when the result is actually consumed.
#[derive(Debug, Clone)]
pub struct Produced<T> {
    result: Result<T, ProductionError>,
}

impl<T> Produced<T> {
    pub fn successful(value: T) -> Self {
        Produced { result: Ok(value) }
    }

    pub fn failed(error: ProductionError) -> Self {
        Produced { result: Err(error) }
    }

    pub fn get(self) -> Result<T, ProductionError> {
        self.result
    }
}

pub type ProducerFuture<'a, T> = Pin<Box<dyn Future<Output = Produced<T>> + 'a>>;

/// Asynchronous counterpart of [`Provider`].
pub trait Producer<T> {
    fn produce(&self) -> ProducerFuture<'_, T>;
}

/// Adapts a synchronous provider into a producer, for provision bindings
/// consumed from production code.
pub struct ProducerFromProvider<T> {
    provider: Rc<dyn Provider<T>>,
}

impl<T> ProducerFromProvider<T> {
    pub fn create(provider: Rc<dyn Provider<T>>) -> Rc<Self> {
        Rc::new(ProducerFromProvider { provider })
    }
}

impl<T> Producer<T> for ProducerFromProvider<T> {
    fn produce(&self) -> ProducerFuture<'_, T> {
        let value = Produced::successful(self.provider.get());
        Box::pin(std::future::ready(value))
    }
}
