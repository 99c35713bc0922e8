//! The `trans` command: reads one or more channels from a simple CSV
//! (`channel,sample_rate_hz,v0,v1,...` per row) and runs TRANS's `sig=`/
//! `annot=` synthesis (section 4.6) over them.

use color_eyre::eyre::{eyre, Context, Result};
use luna_core::trans::{self, ChannelBinding};

/// Parses the channel CSV format used by this CLI: one row per channel,
/// `name,sample_rate_hz,v0,v1,...`.
pub fn parse_channel_csv(text: &str) -> Result<Vec<ChannelBinding>> {
    let mut channels = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split(',');
        let name = fields.next().ok_or_else(|| eyre!("line {}: missing channel name", lineno + 1))?.to_string();
        let sample_rate_hz: f64 = fields
            .next()
            .ok_or_else(|| eyre!("line {}: missing sample rate", lineno + 1))?
            .parse()
            .with_context(|| format!("line {}: invalid sample rate", lineno + 1))?;
        let samples: Vec<f64> = fields.map(|f| f.parse::<f64>()).collect::<std::result::Result<_, _>>().with_context(|| format!("line {}: invalid sample value", lineno + 1))?;
        channels.push(ChannelBinding { name, sample_rate_hz, samples });
    }
    Ok(channels)
}

/// `sig=X, expr=...`: prints `X`'s new sample rate and values.
pub fn run_sig(expr: &str, channels: &[ChannelBinding], out_channel: &str) -> Result<()> {
    let (rate, samples) = trans::eval_sig(expr, channels, out_channel).map_err(|e| eyre!("{e}"))?;
    println!("sig={out_channel}\trate={rate}");
    for (i, v) in samples.iter().enumerate() {
        println!("{i}\t{v}");
    }
    Ok(())
}

/// `annot=A, expr=...`: prints one line per contiguous true-run interval,
/// in whole seconds (tick / 1e9).
pub fn run_annot(expr: &str, channels: &[ChannelBinding], annot_name: &str) -> Result<()> {
    let intervals = trans::eval_annot(expr, channels).map_err(|e| eyre!("{e}"))?;
    println!("annot={annot_name}\tn={}", intervals.len());
    for (i, iv) in intervals.iter().enumerate() {
        println!("{}\t{}\t{}", i + 1, iv.start.seconds(), iv.stop.seconds());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_channel_csv() {
        let csv = "C3,100,1.0,2.0,3.0\n# comment\nC4,100,4.0,5.0,6.0\n";
        let channels = parse_channel_csv(csv).unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "C3");
        assert_eq!(channels[0].samples, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn sig_runs_end_to_end() {
        let channels = parse_channel_csv("C3,100,1.0,2.0,3.0\nC4,100,10.0,20.0,30.0\n").unwrap();
        run_sig("C3 + C4", &channels, "SUM").unwrap();
    }

    #[test]
    fn annot_runs_end_to_end() {
        let channels = parse_channel_csv("C,1,0.1,0.6,0.7,0.2,0.8,0.9,0.3\n").unwrap();
        run_annot("C > 0.5", &channels, "HIGH").unwrap();
    }
}
