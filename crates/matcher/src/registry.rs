//! Operator type → strategy dispatch table.

use crate::strategies::{
    BinaryElementwiseStrategy, ConcatStrategy, ConvStrategy, MemcpyStrategy, NoKernelStrategy,
    SliceStrategy, SplitStrategy, UnaryElementwiseStrategy,
};
use crate::strategy::{DynMatchStrategy, MatchStrategy};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, DynMatchStrategy>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn with_default_strategies() -> Self {
        let mut registry = Self::new();
        registry.register("Conv", ConvStrategy);
        registry.register("Concat", ConcatStrategy);
        registry.register("Split", SplitStrategy);
        registry.register("Slice", SliceStrategy);

        let binary: DynMatchStrategy = Arc::new(BinaryElementwiseStrategy);
        for op_type in ["Mul", "Div", "Add", "Sub"] {
            registry.register_shared(op_type, Arc::clone(&binary));
        }
        let unary: DynMatchStrategy = Arc::new(UnaryElementwiseStrategy);
        for op_type in ["Sigmoid", "MaxPool", "Softmax", "Transpose"] {
            registry.register_shared(op_type, Arc::clone(&unary));
        }
        let no_kernel: DynMatchStrategy = Arc::new(NoKernelStrategy);
        for op_type in ["Reshape", "Resize", "Shape", "Gather"] {
            registry.register_shared(op_type, Arc::clone(&no_kernel));
        }
        let memcpy: DynMatchStrategy = Arc::new(MemcpyStrategy);
        for op_type in ["MemcpyFromHost", "MemcpyToHost"] {
            registry.register_shared(op_type, Arc::clone(&memcpy));
        }
        registry
    }

    /// Register `strategy` for `op_type`, replacing any earlier registration.
    pub fn register<S>(&mut self, op_type: impl Into<String>, strategy: S)
    where
        S: MatchStrategy + 'static,
    {
        self.register_shared(op_type, Arc::new(strategy));
    }

    pub fn register_shared(&mut self, op_type: impl Into<String>, strategy: DynMatchStrategy) {
        self.strategies.insert(op_type.into(), strategy);
    }

    pub fn find(&self, op_type: &str) -> Option<DynMatchStrategy> {
        self.strategies.get(op_type).map(Arc::clone)
    }

    pub fn op_types(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut op_types: Vec<_> = self.op_types().collect();
        op_types.sort_unstable();
        f.debug_struct("StrategyRegistry")
            .field("op_types", &op_types)
            .finish()
    }
}
