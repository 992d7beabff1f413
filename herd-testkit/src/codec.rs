use herd::SiteCodec;

/// `name=value` per line site-file codec.
///
/// Blank lines and lines starting with `#` are ignored when parsing.
#[derive(Clone, Copy, Debug, Default)]
pub struct PropertiesCodec;

impl SiteCodec for PropertiesCodec {
    fn parse(&self, raw: &str) -> anyhow::Result<Vec<(String, String)>> {
        raw.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let (name, value) = line
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("malformed property line: {line}"))?;
                Ok((name.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }

    fn render(&self, properties: &[(String, String)]) -> String {
        properties
            .iter()
            .map(|(name, value)| format!("{name}={value}\n"))
            .collect()
    }
}
