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

use crate::Provider;
use std::collections::HashMap;
use std::rc::Rc;

/// Provider returning clones of a fixed instance, used for bound instances
/// and component dependencies.
pub struct InstanceFactory<T: Clone> {
    instance: T,
}

impl<T: Clone> InstanceFactory<T> {
    pub fn create(instance: T) -> Rc<Self> {
        Rc::new(InstanceFactory { instance })
    }
}

impl<T: Clone> Provider<T> for InstanceFactory<T> {
    fn get(&self) -> T {
        self.instance.clone()
    }
}

/// Singleton-style factory for a multibound vec with no contributions.
pub struct EmptyVecFactory;

impl EmptyVecFactory {
    pub fn provider<T: 'static>() -> Rc<dyn Provider<Vec<T>>> {
        Rc::new(EmptyVecFactory)
    }
}

impl<T> Provider<Vec<T>> for EmptyVecFactory {
    fn get(&self) -> Vec<T> {
        Vec::new()
    }
}

/// Singleton-style factory for a multibound map with no contributions.
pub struct EmptyMapFactory;

impl EmptyMapFactory {
    pub fn provider<K: 'static + std::hash::Hash + Eq, V: 'static>(
    ) -> Rc<dyn Provider<HashMap<K, V>>> {
        Rc::new(EmptyMapFactory)
    }
}

impl<K: std::hash::Hash + Eq, V> Provider<HashMap<K, V>> for EmptyMapFactory {
    fn get(&self) -> HashMap<K, V> {
        HashMap::new()
    }
}

/// Aggregates element providers into a `Vec` provider.
pub struct VecFactory<T> {
    providers: Vec<Rc<dyn Provider<T>>>,
}

impl<T> VecFactory<T> {
    pub fn builder() -> VecFactoryBuilder<T> {
        VecFactoryBuilder {
            providers: Vec::new(),
        }
    }
}

impl<T> Provider<Vec<T>> for VecFactory<T> {
    fn get(&self) -> Vec<T> {
        self.providers.iter().map(|provider| provider.get()).collect()
    }
}

pub struct VecFactoryBuilder<T> {
    providers: Vec<Rc<dyn Provider<T>>>,
}

impl<T> VecFactoryBuilder<T> {
    pub fn add_provider(mut self, provider: Rc<dyn Provider<T>>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> Rc<VecFactory<T>> {
        Rc::new(VecFactory {
            providers: self.providers,
        })
    }
}

/// Aggregates keyed value providers into a `HashMap` provider.
pub struct MapFactory<K: Clone + std::hash::Hash + Eq, V> {
    entries: Vec<(K, Rc<dyn Provider<V>>)>,
}

impl<K: Clone + std::hash::Hash + Eq, V> MapFactory<K, V> {
    pub fn builder() -> MapFactoryBuilder<K, V> {
        MapFactoryBuilder {
            entries: Vec::new(),
        }
    }
}

impl<K: Clone + std::hash::Hash + Eq, V> Provider<HashMap<K, V>> for MapFactory<K, V> {
    fn get(&self) -> HashMap<K, V> {
        self.entries
            .iter()
            .map(|(key, provider)| (key.clone(), provider.get()))
            .collect()
    }
}

pub struct MapFactoryBuilder<K: Clone + std::hash::Hash + Eq, V> {
    entries: Vec<(K, Rc<dyn Provider<V>>)>,
}

impl<K: Clone + std::hash::Hash + Eq, V> MapFactoryBuilder<K, V> {
    pub fn put(mut self, key: K, provider: Rc<dyn Provider<V>>) -> Self {
        self.entries.push((key, provider));
        self
    }

    pub fn build(self) -> Rc<MapFactory<K, V>> {
        Rc::new(MapFactory {
            entries: self.entries,
        })
    }
}

/// Optional binding with an underlying provider present.
pub struct PresentFactory<T> {
    provider: Rc<dyn Provider<T>>,
}

impl<T> PresentFactory<T> {
    pub fn create(provider: Rc<dyn Provider<T>>) -> Rc<Self> {
        Rc::new(PresentFactory { provider })
    }
}

impl<T> Provider<Option<T>> for PresentFactory<T> {
    fn get(&self) -> Option<T> {
        Some(self.provider.get())
    }
}

/// Optional binding with no underlying provider.
pub struct AbsentFactory;

impl AbsentFactory {
    pub fn provider<T: 'static>() -> Rc<dyn Provider<Option<T>>> {
        Rc::new(AbsentFactory)
    }
}

impl<T> Provider<Option<T>> for AbsentFactory {
    fn get(&self) -> Option<T> {
        None
    }
}
