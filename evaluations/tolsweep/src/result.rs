//! 实验结果.

use crate::profile::SweepProfile;
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(tolerance_nm: f64, p: &SweepProfile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    #[inline]
    fn u64_to_display(u: Option<u64>) -> String {
        match u {
            Some(u) => u.to_string(),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Tolerance {tolerance_nm} nm:")?;
    writeln!(w, "{S4}Evaluated pairs: {}", p.get_pairs())?;
    writeln!(w, "{S4}Failed pairs: {}", p.get_failed())?;
    writeln!(w, "{S4}Total splits: {}", p.get_splits())?;
    writeln!(w, "{S4}Total merges: {}", p.get_merges())?;
    writeln!(w, "{S4}Total errors: {}", p.get_splits() + p.get_merges())?;
    writeln!(w, "{S4}Effective total time: {} us", p.get_eval_time_us())?;
    writeln!(
        w,
        "{S4}Effective average time: {} us",
        f64_to_display(p.get_avg_eval_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.get_real_time_us())?;
    writeln!(
        w,
        "{S4}Compact location stacks: {} bytes",
        p.get_compact_bytes()
    )?;
    let t = p.get_most_time_consuming().map(|d| d.as_micros() as u64);
    write!(w, "{S4}Most time-consuming pair costs {} us", u64_to_display(t))?;
    Ok(())
}

/// 容差扫描最终结果.
pub struct SweepResult {
    data: Vec<(f64, SweepProfile)>,
}

impl SweepResult {
    pub fn from_iter<I: IntoIterator<Item = (f64, SweepProfile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (tolerance_nm, profile) in self.data.iter() {
            describe_into(*tolerance_nm, profile, &mut buf).unwrap();
            println!("{}", std::str::from_utf8(&buf).unwrap());
            buf.clear();

            utils::sep();
        }
    }
}
