/// The subset of the Prometheus remote-write protobuf schema (`prompb`)
/// needed to push plain samples.
pub mod prometheus {
    pub mod prompb {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct WriteRequest {
            #[prost(message, repeated, tag = "1")]
            pub timeseries: ::prost::alloc::vec::Vec<TimeSeries>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct TimeSeries {
            #[prost(message, repeated, tag = "1")]
            pub labels: ::prost::alloc::vec::Vec<Label>,
            #[prost(message, repeated, tag = "2")]
            pub samples: ::prost::alloc::vec::Vec<Sample>,
        }

        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Label {
            #[prost(string, tag = "1")]
            pub name: ::prost::alloc::string::String,
            #[prost(string, tag = "2")]
            pub value: ::prost::alloc::string::String,
        }

        #[derive(Clone, Copy, PartialEq, ::prost::Message)]
        pub struct Sample {
            #[prost(double, tag = "1")]
            pub value: f64,
            #[prost(int64, tag = "2")]
            pub timestamp: i64,
        }
    }
}

use chrono::Utc;
use prometheus::prompb::{Label, Sample, TimeSeries, WriteRequest};
use reqwest::{
    Client,
    header::{CONTENT_ENCODING, CONTENT_TYPE},
};

const REMOTE_WRITE_PATH: &str = "/api/v1/push";
const REMOTE_WRITE_VERSION: &str = "0.1.0";
const NAME_LABEL: &str = "__name__";

/// Pushes one batch of series to `{mimir_endpoint}/api/v1/push` as a
/// snappy-compressed `WriteRequest`. `tenant_id` becomes `X-Scope-OrgID`.
/// An empty batch is skipped; a non-2xx answer is an error carrying the
/// response body.
pub async fn send_to_mimir(
    client: &Client,
    mimir_endpoint: &str,
    tenant_id: Option<&str>,
    metrics: Vec<TimeSeries>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if metrics.is_empty() {
        log::debug!("Nothing to push to {mimir_endpoint}");
        return Ok(());
    }

    let series = metrics.len();
    let encoded = prost::Message::encode_to_vec(&WriteRequest { timeseries: metrics });
    let body = snap::raw::Encoder::new().compress_vec(&encoded)?;

    let mut request = client
        .post(format!("{}{REMOTE_WRITE_PATH}", mimir_endpoint.trim_end_matches('/')))
        .header(CONTENT_ENCODING, "snappy")
        .header(CONTENT_TYPE, "application/x-protobuf")
        .header("X-Prometheus-Remote-Write-Version", REMOTE_WRITE_VERSION)
        .body(body);
    if let Some(tenant) = tenant_id {
        request = request.header("X-Scope-OrgID", tenant);
    }

    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        log::debug!("Pushed {series} series to {mimir_endpoint}");
        return Ok(());
    }

    let reason = response.text().await.unwrap_or_default();
    Err(format!("remote write rejected with {status}: {reason}").into())
}

/// One sample of `metric_name`, labelled with `__name__` first and then
/// `labels` in the given order. Stamped with the current time unless
/// `timestamp_ms` is given.
pub fn create_time_series(
    metric_name: &str,
    labels: &[(&str, &str)],
    value: f64,
    timestamp_ms: Option<i64>,
) -> TimeSeries {
    let labels = std::iter::once((NAME_LABEL, metric_name))
        .chain(labels.iter().copied())
        .map(|(name, value)| Label {
            name: name.to_owned(),
            value: value.to_owned(),
        })
        .collect();

    TimeSeries {
        labels,
        samples: vec![Sample {
            value,
            timestamp: timestamp_ms.unwrap_or_else(|| Utc::now().timestamp_millis()),
        }],
    }
}
