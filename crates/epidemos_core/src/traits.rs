use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric type the rate equations and solvers are generic over.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Right-hand side of a compartmental model, `dx/dt = f(t, x)`.
///
/// Implementations must be pure: the integrator may evaluate them any number
/// of times per step, including at rejected trial states.
pub trait RateEquations<T: Scalar> {
    /// Ordered compartment names. Slot `i` of every state vector belongs to
    /// `compartments()[i]`.
    fn compartments(&self) -> &'static [&'static str];

    fn dimension(&self) -> usize {
        self.compartments().len()
    }

    /// Writes the derivative of each compartment into `out`.
    fn derivatives(&self, t: T, x: &[T], out: &mut [T]);
}

/// Single-step kernels that advance a state in place by a fixed `dt`.
pub trait Steppable<T: Scalar> {
    fn step(&mut self, system: &impl RateEquations<T>, t: &mut T, state: &mut [T], dt: T);
}
