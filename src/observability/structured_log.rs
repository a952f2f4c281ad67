/// 構造化JSON形式ログ。
use serde_json::{Map, Value, json};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// イベントを1行の JSON として標準エラーへ書き出すレイヤー。
pub(crate) struct StructuredLogLayer;

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    values: Map<String, Value>,
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.values
                .insert(field.name().to_string(), json!(format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.values.insert(field.name().to_string(), json!(value));
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.values.insert(field.name().to_string(), json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.values.insert(field.name().to_string(), json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.values.insert(field.name().to_string(), json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.values.insert(field.name().to_string(), json!(value));
    }
}

pub(crate) fn render_event(event: &Event<'_>) -> Value {
    let mut visitor = JsonVisitor::default();
    event.record(&mut visitor);

    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "level": event.metadata().level().as_str(),
        "target": event.metadata().target(),
        "message": visitor.message.unwrap_or_default(),
        "fields": visitor.values,
    })
}

impl<S: Subscriber> Layer<S> for StructuredLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let entry = render_event(event);
        eprintln!("{}", serde_json::to_string(&entry).unwrap_or_default());
    }
}
