//! Derivative-free one-dimensional kernels: Brent minimisation and Brent root finding.
//!
//! Both routines accept objectives that return `+∞` (or other non-finite
//! values) at rejected points: interpolation steps are skipped in favour of
//! golden-section / bisection steps whenever a value involved is non-finite.

use ae_core::{Error, Result};

/// `(3 - √5) / 2`
const GOLDEN: f64 = 0.381_966_011_250_105_1;

/// Outcome of [`minimize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrentMinimum {
    /// Abscissa of the minimum.
    pub x: f64,
    /// Objective value at `x`.
    pub fx: f64,
    /// Iterations used.
    pub iterations: usize,
}

/// Outcome of [`find_root`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrentRoot {
    /// Best root estimate (the bracket end with the smaller `|f|`).
    pub x: f64,
    /// Iterations used.
    pub iterations: usize,
}

/// Minimise `f` on `[a, b]` starting from `guess` (golden section + parabolic interpolation).
///
/// Stops once the remaining bracket is within `4·(rel_tol·|x| + abs_tol)` of
/// the current best point. Finds a local minimum; for unimodal objectives on
/// the bracket this is the global one.
pub fn minimize<F>(
    mut f: F,
    a: f64,
    b: f64,
    guess: f64,
    rel_tol: f64,
    abs_tol: f64,
    max_iter: usize,
) -> Result<BrentMinimum>
where
    F: FnMut(f64) -> Result<f64>,
{
    if !(a < b) {
        return Err(Error::InvalidInput(format!("invalid minimisation bracket [{a}, {b}]")));
    }
    let (mut a, mut b) = (a, b);
    let mut x = if guess.is_finite() { guess.clamp(a, b) } else { a + GOLDEN * (b - a) };
    let mut fx = f(x)?;
    let (mut w, mut fw) = (x, fx);
    let (mut v, mut fv) = (x, fx);
    let mut d = 0.0f64;
    let mut e = 0.0f64;

    for iter in 0..max_iter {
        let m = 0.5 * (a + b);
        let tol1 = rel_tol * x.abs() + abs_tol;
        let tol2 = 2.0 * tol1;
        if (x - m).abs() <= tol2 - 0.5 * (b - a) {
            return Ok(BrentMinimum { x, fx, iterations: iter });
        }

        let mut parabolic = false;
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            } else {
                q = -q;
            }
            let e_prev = e;
            e = d;
            if p.is_finite()
                && q.is_finite()
                && p.abs() < (0.5 * q * e_prev).abs()
                && p > q * (a - x)
                && p < q * (b - x)
            {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(m - x);
                }
                parabolic = true;
            }
        }
        if !parabolic {
            e = if x >= m { a - x } else { b - x };
            d = GOLDEN * e;
        }

        let u = if d.abs() >= tol1 { x + d } else { x + tol1.copysign(d) };
        let fu = f(u)?;
        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            (v, fv) = (w, fw);
            (w, fw) = (x, fx);
            (x, fx) = (u, fu);
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                (v, fv) = (w, fw);
                (w, fw) = (u, fu);
            } else if fu <= fv || v == x || v == w {
                (v, fv) = (u, fu);
            }
        }
    }

    Err(Error::Convergence {
        context: "Brent minimisation".into(),
        iterations: max_iter,
        lower: a,
        upper: b,
    })
}

/// Find a root of `f` in `[a, b]` given `fa = f(a)` and `fb = f(b)` of opposite sign.
///
/// Stops when the bracket around the root is narrower than `tol`.
pub fn find_root<F>(
    mut f: F,
    a: f64,
    b: f64,
    fa: f64,
    fb: f64,
    tol: f64,
    max_iter: usize,
) -> Result<BrentRoot>
where
    F: FnMut(f64) -> Result<f64>,
{
    if fa == 0.0 {
        return Ok(BrentRoot { x: a, iterations: 0 });
    }
    if fb == 0.0 {
        return Ok(BrentRoot { x: b, iterations: 0 });
    }
    if fa.is_nan() || fb.is_nan() || fa.signum() == fb.signum() {
        return Err(Error::RootNotBracketed { lower: a, upper: b, f_lower: fa, f_upper: fb });
    }

    let (mut a, mut b, mut fa, mut fb) = (a, b, fa, fb);
    let (mut c, mut fc) = (b, fb);
    let mut d = b - a;
    let mut e = d;
    let tol1 = 0.5 * tol;

    for iter in 0..max_iter {
        if fb.signum() == fc.signum() {
            (c, fc) = (a, fa);
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            (a, fa) = (b, fb);
            (b, fb) = (c, fc);
            (c, fc) = (a, fa);
        }
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Ok(BrentRoot { x: b, iterations: iter });
        }

        let finite = fa.is_finite() && fb.is_finite() && fc.is_finite();
        if finite && e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // Secant.
                (2.0 * xm * s, 1.0 - s)
            } else {
                // Inverse quadratic interpolation.
                let qa = fa / fc;
                let r = fb / fc;
                let p = s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0));
                (p, (qa - 1.0) * (r - 1.0) * (s - 1.0))
            };
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        (a, fa) = (b, fb);
        b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
        fb = f(b)?;
    }

    Err(Error::Convergence {
        context: "Brent root search".into(),
        iterations: max_iter,
        lower: b.min(c),
        upper: b.max(c),
    })
}
