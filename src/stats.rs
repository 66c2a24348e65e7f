use std::fmt;

/// Agreement between reference (ground) and retrieved (satellite) AOD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationStats {
    pub n: usize,
    /// Mean of retrieved - reference
    pub bias: f64,
    pub rmse: f64,
    /// `None` when either series has zero variance
    pub pearson_r: Option<f64>,
}

impl ValidationStats {
    /// Statistics over (reference, retrieved) pairs; needs at least two pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Option<Self> {
        if pairs.len() < 2 {
            return None;
        }

        let n = pairs.len() as f64;
        let mean_ref = pairs.iter().map(|(r, _)| r).sum::<f64>() / n;
        let mean_ret = pairs.iter().map(|(_, s)| s).sum::<f64>() / n;

        let mut sum_diff = 0.0;
        let mut sum_sq_diff = 0.0;
        let mut cov = 0.0;
        let mut var_ref = 0.0;
        let mut var_ret = 0.0;
        for &(r, s) in pairs {
            let diff = s - r;
            sum_diff += diff;
            sum_sq_diff += diff * diff;

            let dr = r - mean_ref;
            let ds = s - mean_ret;
            cov += dr * ds;
            var_ref += dr * dr;
            var_ret += ds * ds;
        }

        let pearson_r = if var_ref > 0.0 && var_ret > 0.0 {
            Some(cov / (var_ref * var_ret).sqrt())
        } else {
            None
        };

        Some(Self {
            n: pairs.len(),
            bias: sum_diff / n,
            rmse: (sum_sq_diff / n).sqrt(),
            pearson_r,
        })
    }
}

impl fmt::Display for ValidationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n={} bias={:.4} rmse={:.4}", self.n, self.bias, self.rmse)?;
        match self.pearson_r {
            Some(r) => write!(f, " r={:.4}", r),
            None => write!(f, " r=n/a"),
        }
    }
}
