use crate::traits::{RateEquations, Scalar, Steppable};

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl RateEquations<T>, t: &mut T, state: &mut [T], dt: T) {
        let two = T::one() + T::one();
        let half = T::one() / two;
        let sixth = T::one() / (two + two + two);
        let t0 = *t;

        system.derivatives(t0, state, &mut self.k1);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.derivatives(t0 + dt * half, &self.tmp, &mut self.k2);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.derivatives(t0 + dt * half, &self.tmp, &mut self.k3);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.derivatives(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

// Tsitouras 5(4) tableau.
const C2: f64 = 0.161;
const C3: f64 = 0.327;
const C4: f64 = 0.9;
const C5: f64 = 0.9800255409045097;

const A21: f64 = 0.161;
const A31: f64 = -0.008480655492356989;
const A32: f64 = 0.335480655492357;
const A41: f64 = 2.898;
const A42: f64 = -6.359447987781783;
const A43: f64 = 4.361447987781783;
const A51: f64 = 5.325864858437957;
const A52: f64 = -11.748883564062828;
const A53: f64 = 7.495539342889693;
const A54: f64 = -0.09249506636030195;
const A61: f64 = 5.86145544294642;
const A62: f64 = -12.92096931784711;
const A63: f64 = 8.159367898576159;
const A64: f64 = -0.071584973281401;
const A65: f64 = -0.02826857949054663;

// 5th order weights; the last stage is evaluated at the new state (FSAL).
const B1: f64 = 0.09646076681806523;
const B2: f64 = 0.01;
const B3: f64 = 0.4798896504144996;
const B4: f64 = 1.379008574103742;
const B5: f64 = -3.290069515436099;
const B6: f64 = 2.324710524099774;

// Difference between the 5th and embedded 4th order weights.
const E1: f64 = -0.00178001105222577714;
const E2: f64 = -0.0008164344596567469;
const E3: f64 = 0.007880878010261995;
const E4: f64 = -0.1447110071732629;
const E5: f64 = 0.5823571654525552;
const E6: f64 = -0.45808210592918697;
const E7: f64 = 1.0 / 66.0;

/// Tsitouras 5/4 embedded pair.
///
/// Unlike [`RK4`] this does not advance the state itself: [`Tsit5::attempt`]
/// writes a trial state and a local error vector, and the caller decides
/// whether to [`Tsit5::accept`] it.
pub struct Tsit5 {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    k7: Vec<f64>,
    tmp: Vec<f64>,
}

impl Tsit5 {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            k7: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }

    /// Evaluates the first stage at `(t, state)`. Needed once before the first
    /// attempt; afterwards `accept` carries the last stage over.
    pub fn prime(&mut self, system: &impl RateEquations<f64>, t: f64, state: &[f64]) {
        system.derivatives(t, state, &mut self.k1);
    }

    /// Derivative at the start of the pending step.
    pub fn start_derivative(&self) -> &[f64] {
        &self.k1
    }

    /// Derivative at the trial state of the last attempt.
    pub fn end_derivative(&self) -> &[f64] {
        &self.k7
    }

    pub fn attempt(
        &mut self,
        system: &impl RateEquations<f64>,
        t: f64,
        state: &[f64],
        dt: f64,
        next: &mut [f64],
        error: &mut [f64],
    ) {
        let n = state.len();

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (A21 * self.k1[i]);
        }
        system.derivatives(t + C2 * dt, &self.tmp, &mut self.k2);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (A31 * self.k1[i] + A32 * self.k2[i]);
        }
        system.derivatives(t + C3 * dt, &self.tmp, &mut self.k3);

        for i in 0..n {
            self.tmp[i] =
                state[i] + dt * (A41 * self.k1[i] + A42 * self.k2[i] + A43 * self.k3[i]);
        }
        system.derivatives(t + C4 * dt, &self.tmp, &mut self.k4);

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (A51 * self.k1[i] + A52 * self.k2[i] + A53 * self.k3[i] + A54 * self.k4[i]);
        }
        system.derivatives(t + C5 * dt, &self.tmp, &mut self.k5);

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (A61 * self.k1[i]
                    + A62 * self.k2[i]
                    + A63 * self.k3[i]
                    + A64 * self.k4[i]
                    + A65 * self.k5[i]);
        }
        system.derivatives(t + dt, &self.tmp, &mut self.k6);

        for i in 0..n {
            next[i] = state[i]
                + dt * (B1 * self.k1[i]
                    + B2 * self.k2[i]
                    + B3 * self.k3[i]
                    + B4 * self.k4[i]
                    + B5 * self.k5[i]
                    + B6 * self.k6[i]);
        }
        system.derivatives(t + dt, next, &mut self.k7);

        for i in 0..n {
            error[i] = dt
                * (E1 * self.k1[i]
                    + E2 * self.k2[i]
                    + E3 * self.k3[i]
                    + E4 * self.k4[i]
                    + E5 * self.k5[i]
                    + E6 * self.k6[i]
                    + E7 * self.k7[i]);
        }
    }

    pub fn accept(&mut self) {
        std::mem::swap(&mut self.k1, &mut self.k7);
    }
}

/// Cubic Hermite interpolation across one step of length `h`, at fraction
/// `theta` in [0, 1].
pub fn hermite_interpolate(
    y0: &[f64],
    f0: &[f64],
    y1: &[f64],
    f1: &[f64],
    h: f64,
    theta: f64,
    out: &mut [f64],
) {
    let t2 = theta * theta;
    let t3 = t2 * theta;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + theta;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    for i in 0..out.len() {
        out[i] = h00 * y0[i] + h10 * h * f0[i] + h01 * y1[i] + h11 * h * f1[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl RateEquations<f64> for Decay {
        fn compartments(&self) -> &'static [&'static str] {
            &["x"]
        }

        fn derivatives(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    #[test]
    fn rk4_tracks_exponential_decay() {
        let mut solver = RK4::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        for _ in 0..100 {
            solver.step(&Decay, &mut t, &mut state, 0.01);
        }
        assert!((t - 1.0).abs() < 1e-12);
        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-10);
    }

    #[test]
    fn tsit5_step_is_fifth_order_accurate_with_small_error_estimate() {
        let mut solver = Tsit5::new(1);
        let state = [1.0];
        let mut next = [0.0];
        let mut error = [0.0];
        solver.prime(&Decay, 0.0, &state);
        solver.attempt(&Decay, 0.0, &state, 0.1, &mut next, &mut error);
        assert!((next[0] - (-0.1f64).exp()).abs() < 1e-8);
        assert!(error[0].abs() < 1e-4);
        assert!((solver.end_derivative()[0] + next[0]).abs() < 1e-15);

        solver.accept();
        assert_eq!(solver.start_derivative()[0], -next[0]);
    }

    #[test]
    fn hermite_reproduces_endpoints_and_cubics() {
        // y = t^3 on [0, 2]
        let y0 = [0.0];
        let f0 = [0.0];
        let y1 = [8.0];
        let f1 = [12.0];
        let mut out = [0.0];
        hermite_interpolate(&y0, &f0, &y1, &f1, 2.0, 0.0, &mut out);
        assert_eq!(out[0], 0.0);
        hermite_interpolate(&y0, &f0, &y1, &f1, 2.0, 1.0, &mut out);
        assert!((out[0] - 8.0).abs() < 1e-12);
        hermite_interpolate(&y0, &f0, &y1, &f1, 2.0, 0.25, &mut out);
        assert!((out[0] - 0.125).abs() < 1e-12);
    }
}
