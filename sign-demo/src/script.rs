//! Scripted replay against a document controller.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sign_core::{
    EventKind, Field, FieldId, FieldPatch, Point, PointerEvent, PointerPhase, ViewMode,
    ViewerConfig, ViewerEvent, ZoomInput,
};
use sign_viewer::{
    DocumentController, DocumentSource, MemoryRasterizer, PrintJob, PrintOptions, PrintPipeline,
    ViewerResult,
};

use crate::DemoResult;

/// Events a host can observe.
const PUBLIC_EVENTS: [EventKind; 8] = [
    EventKind::DocumentLoaded,
    EventKind::PageChange,
    EventKind::ScaleChange,
    EventKind::FieldAdd,
    EventKind::FieldRemove,
    EventKind::FieldUpdate,
    EventKind::FieldsChange,
    EventKind::Error,
];

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    /// Add a field.
    AddField {
        /// Field to add; a missing id is generated.
        field: Field,
    },
    /// Patch a field.
    UpdateField {
        /// Field to patch.
        id: FieldId,
        /// Changes.
        patch: FieldPatch,
    },
    /// Remove a field.
    RemoveField {
        /// Field to remove.
        id: FieldId,
    },
    /// Replace the field list.
    SetFields {
        /// New list.
        fields: Vec<Field>,
    },
    /// Remove every field.
    ClearFields,
    /// Navigate to a page (1-based).
    GoToPage {
        /// Page number.
        page: usize,
    },
    /// Navigate forward.
    NextPage,
    /// Navigate back.
    PreviousPage,
    /// Zoom.
    SetScale {
        /// New scale.
        scale: f64,
    },
    /// Switch view mode.
    SetViewMode {
        /// New mode.
        mode: ViewMode,
    },
    /// Resize the viewport.
    SetViewport {
        /// Width in pixels.
        width: f64,
        /// Height in pixels.
        height: f64,
    },
    /// Scroll to a content offset.
    ScrollTo {
        /// Offset in pixels.
        top: f64,
    },
    /// Raw pointer input.
    Pointer {
        /// The event.
        event: PointerEvent,
    },
    /// Raw zoom input.
    Zoom {
        /// The input.
        input: ZoomInput,
    },
    /// Mouse drag from one client point to another.
    Drag {
        /// Press position.
        from: Point,
        /// Release position.
        to: Point,
    },
    /// Let background renders run.
    Wait {
        /// Milliseconds to sleep.
        ms: u64,
    },
    /// Print the document.
    Print {
        /// Include the fields.
        #[serde(default)]
        with_signatures: bool,
    },
}

/// Summary of one print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintedJob {
    /// Pages sent.
    pub pages: usize,
    /// Fields drawn over them.
    pub fields: usize,
}

/// Outcome of a replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Pages in the document.
    pub total_pages: usize,
    /// Page shown at the end (1-based).
    pub current_page: usize,
    /// Scale at the end.
    pub scale: f64,
    /// View mode at the end.
    pub view_mode: ViewMode,
    /// Final field list.
    pub fields: Vec<Field>,
    /// Every public event, in order.
    pub events: Vec<ViewerEvent>,
    /// Steps that failed, with the reason.
    pub failures: Vec<String>,
    /// Print jobs received.
    pub printed: Vec<PrintedJob>,
}

#[derive(Default)]
struct RecordingPrinter {
    jobs: Mutex<Vec<PrintedJob>>,
}

#[async_trait]
impl PrintPipeline for RecordingPrinter {
    async fn print(&self, job: PrintJob) -> ViewerResult<()> {
        let printed = PrintedJob {
            pages: job.pages.len(),
            fields: job.fields.len(),
        };
        tracing::info!(
            "Print job: {} pages, {} fields",
            printed.pages,
            printed.fields
        );
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(printed);
        Ok(())
    }
}

/// Load a document and replay commands against it.
///
/// Failing steps are logged and recorded in the report; replay continues.
///
/// # Errors
///
/// Returns an error only if the configuration is invalid or the document
/// cannot be loaded.
pub async fn run(
    config: &ViewerConfig,
    document: DocumentSource,
    commands: &[Command],
) -> DemoResult<Report> {
    let controller = DocumentController::new(Arc::new(MemoryRasterizer::new()), config.clone())?;
    let printer = Arc::new(RecordingPrinter::default());
    controller.set_print_pipeline(Arc::clone(&printer) as Arc<dyn PrintPipeline>);

    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in PUBLIC_EVENTS {
        let sink = Arc::clone(&events);
        controller.on(kind, move |event| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
            Ok(())
        });
    }

    controller.load(document).await?;

    let mut failures = Vec::new();
    for (step, command) in commands.iter().enumerate() {
        tracing::debug!("Step {step}: {command:?}");
        if let Err(e) = apply(&controller, command).await {
            tracing::warn!("Step {step} failed: {e}");
            failures.push(format!("step {step}: {e}"));
        }
    }

    let report = Report {
        total_pages: controller.total_pages(),
        current_page: controller.current_page(),
        scale: controller.scale(),
        view_mode: controller.view_mode(),
        fields: controller.fields(),
        events: std::mem::take(&mut *events.lock().unwrap_or_else(PoisonError::into_inner)),
        failures,
        printed: std::mem::take(&mut *printer.jobs.lock().unwrap_or_else(PoisonError::into_inner)),
    };
    controller.destroy();
    Ok(report)
}

async fn apply(controller: &DocumentController, command: &Command) -> DemoResult<()> {
    match command {
        Command::AddField { field } => {
            controller.add_field(field.clone())?;
        }
        Command::UpdateField { id, patch } => controller.update_field(id, patch.clone()),
        Command::RemoveField { id } => controller.remove_field(id),
        Command::SetFields { fields } => controller.set_fields(fields.clone()),
        Command::ClearFields => controller.clear_fields(),
        Command::GoToPage { page } => controller.go_to_page(*page),
        Command::NextPage => controller.next_page(),
        Command::PreviousPage => controller.previous_page(),
        Command::SetScale { scale } => controller.set_scale(*scale),
        Command::SetViewMode { mode } => controller.set_view_mode(*mode).await?,
        Command::SetViewport { width, height } => controller.set_viewport(*width, *height),
        Command::ScrollTo { top } => controller.scroll_to(*top),
        Command::Pointer { event } => controller.handle_pointer(event),
        Command::Zoom { input } => controller.handle_zoom_input(input),
        Command::Drag { from, to } => {
            let mid = Point::new((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
            for (phase, point) in [
                (PointerPhase::Down, *from),
                (PointerPhase::Move, mid),
                (PointerPhase::Up, *to),
            ] {
                controller.handle_pointer(&PointerEvent::mouse(phase, point.x, point.y));
            }
        }
        Command::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
        Command::Print { with_signatures } => {
            controller
                .print(PrintOptions {
                    with_signatures: *with_signatures,
                })
                .await?;
        }
    }
    Ok(())
}
