#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod auditor;
pub mod publish;
pub mod scorer;
pub mod yolo;

pub use auditor::{AuditDirs, AuditReport, LabelQualityAuditor};
pub use publish::{publish_candidates, JsonlPublisher, WebhookPublisher};
pub use scorer::{AnnotatedBox, LabelQualityScorer, MatchingScorer};
pub use yolo::{YoloBox, PLACEHOLDER_LINE};
