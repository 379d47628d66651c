//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FitResult, SampleResidual};

/// Format the fit summary: parameters, plateau, diagnostics.
pub fn format_fit_summary(source: &str, fit: &FitResult, excluded: &[u64], weighted: bool) -> String {
    let mut out = String::new();
    let q = &fit.quality;
    let p = &fit.params;

    out.push_str("=== thresh - threshold plateau fit ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Samples: n={} | weights: {}\n",
        q.n,
        if weighted { "input" } else { "uniform" }
    ));
    if !excluded.is_empty() {
        let sizes: Vec<String> = excluded.iter().map(|s| s.to_string()).collect();
        out.push_str(&format!("Excluded sizes: {}\n", sizes.join(", ")));
    }

    out.push_str("\nModel: f(d) = a - b / (c + d)\n");
    let se = q.std_errors;
    for (i, (name, value)) in [("a", p.a), ("b", p.b), ("c", p.c)].into_iter().enumerate() {
        match se {
            Some(se) => out.push_str(&format!("  {name} = {value:>12.6}  ± {:.6}\n", se[i])),
            None => out.push_str(&format!("  {name} = {value:>12.6}\n")),
        }
    }

    out.push_str(&format!("\nPlateau: {:.4}\n", fit.plateau()));
    out.push_str(&format!(
        "SSE: {:.6e} | RMSE: {:.6e} | dof: {} | iterations: {}\n",
        q.sse, q.rmse, q.dof, q.iterations
    ));

    out
}

/// Format the per-sample residual table.
pub fn format_residuals(residuals: &[SampleResidual]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>8}  {:>10}  {:>10}  {:>11}  {:>8}\n",
        "d", "threshold", "fitted", "residual", "weight"
    ));
    for r in residuals {
        out.push_str(&format!(
            "{:>8}  {:>10.4}  {:>10.4}  {:>+11.2e}  {:>8.3}\n",
            r.sample.size, r.sample.threshold, r.fitted, r.residual, r.weight
        ));
    }
    out
}
