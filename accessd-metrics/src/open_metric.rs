//! A tiny open-metrics rendering abstraction that doesn't pull in a
//! metrics backend crate, since observability backends are an external
//! collaborator here too.

pub trait OpenMetric: Send + Sync {
    fn name(&self) -> String;
    fn measurements(&self) -> Vec<Measurement>;
    fn metric_type(&self) -> &'static str {
        "gauge"
    }
    fn help(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Measurement {
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Measurement {
    pub fn new(value: f64) -> Self {
        Self {
            labels: Vec::new(),
            value,
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((name.into(), value.into()));
        self
    }

    fn render(&self, name: &str) -> String {
        if self.labels.is_empty() {
            format!("{} {:.3}", name, self.value)
        } else {
            let labels = self
                .labels
                .iter()
                .map(|(k, v)| format!("{k}=\"{v}\""))
                .collect::<Vec<_>>()
                .join(",");
            format!("{}{{{}}} {:.3}", name, labels, self.value)
        }
    }
}

/// Render every metric in `metrics` as open-metrics text. A host
/// application mounts this wherever its HTTP surface likes; that surface
/// is out of this crate's scope.
pub fn render_all(metrics: &[&dyn OpenMetric]) -> String {
    let mut out = String::new();
    for metric in metrics {
        let name = metric.name();
        if let Some(help) = metric.help() {
            out.push_str(&format!("# HELP {name} {help}\n"));
        }
        out.push_str(&format!("# TYPE {name} {}\n", metric.metric_type()));
        for measurement in metric.measurements() {
            out.push_str(&measurement.render(&name));
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);
    impl OpenMetric for Fixed {
        fn name(&self) -> String {
            "fixed_value".into()
        }
        fn measurements(&self) -> Vec<Measurement> {
            vec![Measurement::new(self.0).with_label("shard", "s0")]
        }
    }

    #[test]
    fn renders_help_type_and_labels() {
        let metric = Fixed(3.0);
        let rendered = render_all(&[&metric]);
        assert!(rendered.contains("# TYPE fixed_value gauge"));
        assert!(rendered.contains(r#"fixed_value{shard="s0"} 3.000"#));
    }
}
