//! Audio effects chain and built-in effects

mod native;

pub use native::{
    DynamicsEffect, HeatEffect, LimiterEffect, SaturationEffect, SpaceEffect, ToneFilterEffect,
};

use std::fmt::Debug;

/// Audio effect that can process samples in-place.
///
/// `set_param` never jumps: every change ramps over the effect's
/// configured smoothing time.
pub trait AudioEffect: Send + Debug {
    fn name(&self) -> &str;
    fn process(&mut self, samples: &mut [f32]);
    fn set_param(&mut self, name: &str, value: f32);
    fn get_params(&self) -> Vec<EffectParam>;
    /// Whether any parameter is still moving towards its target
    fn is_ramping(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectParam {
    pub name: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub unit: String,
}

impl EffectParam {
    pub fn new(name: &str, value: f32, min: f32, max: f32, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
            unit: unit.to_string(),
        }
    }
}

/// Chain of audio effects processed in order
#[derive(Debug, Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn AudioEffect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Box<dyn AudioEffect>) {
        self.effects.push(effect);
    }

    pub fn process(&mut self, samples: &mut [f32]) {
        for effect in &mut self.effects {
            effect.process(samples);
        }
    }

    /// Set a parameter on the first effect called `effect`.
    ///
    /// Returns false when no such effect is in the chain.
    pub fn set_param(&mut self, effect: &str, name: &str, value: f32) -> bool {
        match self.effects.iter_mut().find(|e| e.name() == effect) {
            Some(target) => {
                target.set_param(name, value);
                true
            }
            None => false,
        }
    }

    pub fn is_ramping(&self) -> bool {
        self.effects.iter().any(|e| e.is_ramping())
    }

    pub fn effects(&self) -> &[Box<dyn AudioEffect>] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
