//! Incremental consultation stream interpreter
//!
//! The consultation service streams plain text lines such as:
//!
//! ```text
//! Processing the question to determine specialties...
//! Specialties determined: Cardiology, Neurology
//! Processing consultation for Cardiology...
//! Cardiology consultation:
//! ...response lines...
//! Compiling final response...
//! Final Response: ...
//! ```
//!
//! Chunks are buffered as bytes and only complete lines are decoded, so the
//! emitted events do not depend on where the network split the body. Each line
//! is matched against an ordered rule table; the first matching rule wins.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::events::{ConsultEvent, SpecialtyStatus, Stage};
use super::specialty::{self, NOT_HEALTH_RELATED};

const QUESTION_MARKER: &str = "Processing the question";
const SPECIALTIES_MARKER: &str = "Specialties determined:";
const CONSULTATION_START_MARKER: &str = "Processing consultation for";
const CONSULTATION_HEADER_MARKER: &str = "consultation:";
const COMPILING_MARKER: &str = "Compiling final response...";
const FINAL_RESPONSE_MARKER: &str = "Final Response:";
const ELLIPSIS: &str = "...";

type Predicate = fn(&StreamInterpreter, &str) -> bool;
type Handler = fn(&mut StreamInterpreter, &str, &mut Vec<ConsultEvent>);

/// One entry of the line grammar
struct LineRule {
    name: &'static str,
    matches: Predicate,
    handle: Handler,
}

/// Line grammar in priority order
const RULES: &[LineRule] = &[
    LineRule {
        name: "question",
        matches: is_question,
        handle: StreamInterpreter::on_question,
    },
    LineRule {
        name: "specialties",
        matches: is_specialties,
        handle: StreamInterpreter::on_specialties,
    },
    LineRule {
        name: "consultation_start",
        matches: is_consultation_start,
        handle: StreamInterpreter::on_consultation_start,
    },
    LineRule {
        name: "consultation_header",
        matches: is_consultation_header,
        handle: StreamInterpreter::on_consultation_header,
    },
    LineRule {
        name: "compiling",
        matches: is_compiling,
        handle: StreamInterpreter::on_compiling,
    },
    LineRule {
        name: "final_response",
        matches: is_final_response,
        handle: StreamInterpreter::on_final_response,
    },
    LineRule {
        name: "final_body",
        matches: in_final_answer,
        handle: StreamInterpreter::on_final_body,
    },
    LineRule {
        name: "consultation_body",
        matches: in_consultation,
        handle: StreamInterpreter::on_consultation_body,
    },
];

/// Turns a chunked consultation stream into [`ConsultEvent`]s
pub struct StreamInterpreter {
    /// Bytes of the trailing partial line
    buffer: Vec<u8>,
    /// Specialty currently being consulted
    current: Option<String>,
    /// Response text of the current specialty, once its header was seen
    specialty_text: Option<String>,
    /// Final answer text, once its marker was seen
    final_text: Option<String>,
    /// Specialties already flushed to Completed
    completed: HashSet<String>,
    /// Set after end-of-stream or failure
    closed: bool,
    stream_start: Instant,
    line_count: usize,
    bytes_received: usize,
}

impl StreamInterpreter {
    pub fn new() -> Self {
        debug!("Consultation stream interpreter created");
        Self {
            buffer: Vec::new(),
            current: None,
            specialty_text: None,
            final_text: None,
            completed: HashSet::new(),
            closed: false,
            stream_start: Instant::now(),
            line_count: 0,
            bytes_received: 0,
        }
    }

    /// Whether end-of-stream or a failure was already processed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Process a chunk of bytes, returning the events for every completed line
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ConsultEvent> {
        let mut events = Vec::new();
        if self.closed {
            debug!("Dropping {} bytes received after close", chunk.len());
            return events;
        }

        self.bytes_received += chunk.len();
        self.buffer.extend_from_slice(chunk);
        debug!(
            "Stream chunk received: {} bytes (total: {} bytes)",
            chunk.len(),
            self.bytes_received
        );

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.process_line(&line[..pos], &mut events);
        }

        events
    }

    /// Signal end-of-stream: classify any partial line, flush, and close
    pub fn finish(&mut self) -> Vec<ConsultEvent> {
        let mut events = Vec::new();
        if self.closed {
            return events;
        }

        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.process_line(&rest, &mut events);
        }
        self.flush_current(&mut events);
        events.push(ConsultEvent::StreamEnded);
        self.closed = true;

        info!(
            "Consultation stream finished after {:?}: {} lines, {} bytes",
            self.stream_start.elapsed(),
            self.line_count,
            self.bytes_received
        );
        events
    }

    /// Signal a transport failure; nothing is flushed and later input is ignored
    pub fn fail(&mut self, reason: impl Into<String>) -> Vec<ConsultEvent> {
        if self.closed {
            return Vec::new();
        }
        let reason = reason.into();
        warn!(
            "Consultation stream failed after {:?} ({} lines): {}",
            self.stream_start.elapsed(),
            self.line_count,
            reason
        );
        self.closed = true;
        self.buffer.clear();
        vec![ConsultEvent::StreamFailed { reason }]
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<ConsultEvent>) {
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.trim_end_matches('\r');
        if line.trim().is_empty() {
            return;
        }
        self.line_count += 1;

        for rule in RULES {
            if (rule.matches)(self, line) {
                debug!("Line #{} -> {}", self.line_count, rule.name);
                (rule.handle)(self, line, events);
                return;
            }
        }

        debug!("Line #{} matched no marker, dropped", self.line_count);
    }

    fn on_question(&mut self, _line: &str, events: &mut Vec<ConsultEvent>) {
        events.push(ConsultEvent::StageChanged {
            stage: Stage::InitialAnalysis,
        });
    }

    fn on_specialties(&mut self, line: &str, events: &mut Vec<ConsultEvent>) {
        let remainder = after_marker(line, SPECIALTIES_MARKER).trim();

        let mut specialties: Vec<String> = Vec::new();
        if remainder != NOT_HEALTH_RELATED {
            for name in remainder.split(',').map(str::trim) {
                if name.is_empty() || specialties.iter().any(|s| s == name) {
                    continue;
                }
                if !specialty::is_known(name) {
                    warn!("Service selected unknown specialty: {}", name);
                }
                specialties.push(name.to_string());
            }
        }

        if specialties.is_empty() {
            info!("Question is not health related");
            events.push(ConsultEvent::NoSpecialties);
            events.push(ConsultEvent::StageChanged {
                stage: Stage::NotHealthRelated,
            });
            return;
        }

        info!("Specialties determined: {}", specialties.join(", "));
        events.push(ConsultEvent::SpecialtiesDiscovered { specialties });
        events.push(ConsultEvent::StageChanged {
            stage: Stage::SpecialistConsultation,
        });
    }

    fn on_consultation_start(&mut self, line: &str, events: &mut Vec<ConsultEvent>) {
        let remainder = after_marker(line, CONSULTATION_START_MARKER);
        let name = remainder
            .split(ELLIPSIS)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if name.is_empty() {
            warn!("Consultation marker without a specialty name: {:?}", line);
            return;
        }

        self.flush_current(events);

        if self.completed.contains(&name) {
            warn!("{} was already completed, not reopening", name);
            return;
        }

        info!("Consulting {}", name);
        self.current = Some(name.clone());
        events.push(ConsultEvent::SpecialtyStatusChanged {
            specialty: name,
            status: SpecialtyStatus::Consulting,
        });
    }

    fn on_consultation_header(&mut self, _line: &str, _events: &mut Vec<ConsultEvent>) {
        if self.current.is_some() {
            self.specialty_text = Some(String::new());
        } else {
            debug!("Consultation header without an active specialty");
            self.specialty_text = None;
        }
    }

    fn on_compiling(&mut self, _line: &str, events: &mut Vec<ConsultEvent>) {
        self.flush_current(events);
        events.push(ConsultEvent::StageChanged {
            stage: Stage::FinalAnalysis,
        });
    }

    fn on_final_response(&mut self, line: &str, events: &mut Vec<ConsultEvent>) {
        let seed = after_marker(line, FINAL_RESPONSE_MARKER).trim();

        match self.final_text.as_mut() {
            // A repeated marker keeps the answer append-only
            Some(text) => append_line(text, seed),
            None => {
                self.final_text = Some(seed.to_string());
                events.push(ConsultEvent::StageChanged {
                    stage: Stage::Completed,
                });
            }
        }

        if let Some(text) = &self.final_text {
            events.push(ConsultEvent::FinalAnswerUpdated { text: text.clone() });
        }
    }

    fn on_final_body(&mut self, line: &str, events: &mut Vec<ConsultEvent>) {
        if let Some(text) = self.final_text.as_mut() {
            append_line(text, line);
            events.push(ConsultEvent::FinalAnswerUpdated { text: text.clone() });
        }
    }

    fn on_consultation_body(&mut self, line: &str, _events: &mut Vec<ConsultEvent>) {
        if let Some(text) = self.specialty_text.as_mut() {
            append_line(text, line);
        }
    }

    /// Complete the current specialty, publishing its response if one was collected
    fn flush_current(&mut self, events: &mut Vec<ConsultEvent>) {
        let text = self.specialty_text.take();
        let Some(specialty) = self.current.take() else {
            return;
        };

        if let Some(text) = text {
            events.push(ConsultEvent::SpecialtyResponseUpdated {
                specialty: specialty.clone(),
                text: clean_response(&text),
            });
        }
        events.push(ConsultEvent::SpecialtyStatusChanged {
            specialty: specialty.clone(),
            status: SpecialtyStatus::Completed,
        });
        self.completed.insert(specialty);
    }
}

impl Default for StreamInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_question(_: &StreamInterpreter, line: &str) -> bool {
    line.contains(QUESTION_MARKER)
}

fn is_specialties(_: &StreamInterpreter, line: &str) -> bool {
    line.contains(SPECIALTIES_MARKER)
}

fn is_consultation_start(_: &StreamInterpreter, line: &str) -> bool {
    line.contains(CONSULTATION_START_MARKER)
}

fn is_consultation_header(_: &StreamInterpreter, line: &str) -> bool {
    line.contains(CONSULTATION_HEADER_MARKER)
}

fn is_compiling(_: &StreamInterpreter, line: &str) -> bool {
    line.trim() == COMPILING_MARKER
}

fn is_final_response(_: &StreamInterpreter, line: &str) -> bool {
    line.contains(FINAL_RESPONSE_MARKER)
}

fn in_final_answer(interp: &StreamInterpreter, _: &str) -> bool {
    interp.final_text.is_some()
}

fn in_consultation(interp: &StreamInterpreter, _: &str) -> bool {
    interp.specialty_text.is_some()
}

/// Text following the first occurrence of `marker`
fn after_marker<'a>(line: &'a str, marker: &str) -> &'a str {
    line.find(marker)
        .map(|idx| &line[idx + marker.len()..])
        .unwrap_or_default()
}

fn append_line(text: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(line);
}

/// Strip a leading "consultation:" label (any case) and surrounding whitespace
fn clean_response(text: &str) -> String {
    let trimmed = text.trim();
    let label_len = CONSULTATION_HEADER_MARKER.len();
    match trimmed.get(..label_len) {
        Some(prefix) if prefix.eq_ignore_ascii_case(CONSULTATION_HEADER_MARKER) => {
            trimmed[label_len..].trim().to_string()
        }
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_STREAM: &str = "Processing the question to determine specialties...\n\
        Specialties determined: Cardiology, Neurology\n\
        Processing consultation for Cardiology...\n\
        Cardiology consultation:\n\
        Patient should see a cardiologist.\n\
        Résumé of vitals: normal.\n\
        Processing consultation for Neurology...\n\
        Neurology consultation:\n\
        Consider a migraine diary.\n\
        Compiling final response...\n\
        Final Response: Summary line one.\n\
        Summary line two.\n";

    fn run(chunks: &[&[u8]]) -> Vec<ConsultEvent> {
        let mut interp = StreamInterpreter::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(interp.feed(chunk));
        }
        events.extend(interp.finish());
        events
    }

    fn run_lines(lines: &[&str]) -> Vec<ConsultEvent> {
        let body = lines.join("\n") + "\n";
        run(&[body.as_bytes()])
    }

    fn status(specialty: &str, status: SpecialtyStatus) -> ConsultEvent {
        ConsultEvent::SpecialtyStatusChanged {
            specialty: specialty.to_string(),
            status,
        }
    }

    #[test]
    fn test_chunk_boundaries_do_not_change_events() {
        let bytes = FULL_STREAM.as_bytes();
        let expected = run(&[bytes]);

        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(run(&[a, b]), expected, "split at byte {}", split);
        }

        let single_bytes: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(run(&single_bytes), expected);

        let uneven: Vec<&[u8]> = bytes.chunks(7).collect();
        assert_eq!(run(&uneven), expected);
    }

    #[test]
    fn test_specialties_discovered_in_order() {
        let events = run_lines(&["Specialties determined: Cardiology, Neurology, Pediatrics"]);
        assert_eq!(
            events[0],
            ConsultEvent::SpecialtiesDiscovered {
                specialties: vec![
                    "Cardiology".to_string(),
                    "Neurology".to_string(),
                    "Pediatrics".to_string()
                ]
            }
        );
        assert_eq!(
            events[1],
            ConsultEvent::StageChanged {
                stage: Stage::SpecialistConsultation
            }
        );
    }

    #[test]
    fn test_not_health_related_sentinel() {
        let events = run_lines(&[
            "Processing the question to determine specialties...",
            "Specialties determined: Nohealth",
            "Compiling final response...",
            "Final Response: I can only help with health questions.",
        ]);

        assert!(events.contains(&ConsultEvent::NoSpecialties));
        assert!(events.contains(&ConsultEvent::StageChanged {
            stage: Stage::NotHealthRelated
        }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ConsultEvent::SpecialtyStatusChanged { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ConsultEvent::SpecialtiesDiscovered { .. })));
    }

    #[test]
    fn test_empty_specialty_list_is_not_health_related() {
        assert_eq!(
            run_lines(&["Specialties determined:   "]),
            vec![
                ConsultEvent::NoSpecialties,
                ConsultEvent::StageChanged {
                    stage: Stage::NotHealthRelated
                },
                ConsultEvent::StreamEnded,
            ]
        );

        // Only separators left after trimming
        assert_eq!(
            run_lines(&["Specialties determined: , ,"])[0],
            ConsultEvent::NoSpecialties
        );
    }

    #[test]
    fn test_consultation_flushes_on_next_specialty() {
        let mut interp = StreamInterpreter::new();
        let events = interp.feed(
            b"Processing consultation for Cardiology...\n\
              consultation:\n\
              Patient should see a cardiologist.\n\
              Processing consultation for Neurology...\n",
        );

        assert_eq!(
            events,
            vec![
                status("Cardiology", SpecialtyStatus::Consulting),
                ConsultEvent::SpecialtyResponseUpdated {
                    specialty: "Cardiology".to_string(),
                    text: "Patient should see a cardiologist.".to_string(),
                },
                status("Cardiology", SpecialtyStatus::Completed),
                status("Neurology", SpecialtyStatus::Consulting),
            ]
        );
    }

    #[test]
    fn test_final_answer_accumulates_incrementally() {
        let mut interp = StreamInterpreter::new();
        let first = interp.feed(b"Final Response: Summary line one.\n");
        assert_eq!(
            first,
            vec![
                ConsultEvent::StageChanged {
                    stage: Stage::Completed
                },
                ConsultEvent::FinalAnswerUpdated {
                    text: "Summary line one.".to_string()
                },
            ]
        );

        let second = interp.feed(b"Summary line two.\n");
        assert_eq!(
            second,
            vec![ConsultEvent::FinalAnswerUpdated {
                text: "Summary line one.\nSummary line two.".to_string()
            }]
        );

        assert_eq!(interp.finish(), vec![ConsultEvent::StreamEnded]);
    }

    #[test]
    fn test_end_of_stream_flushes_consulting_specialty() {
        let events = run_lines(&[
            "Processing consultation for Dermatology...",
            "Dermatology consultation:",
            "Use sunscreen daily.",
        ]);

        assert_eq!(
            events,
            vec![
                status("Dermatology", SpecialtyStatus::Consulting),
                ConsultEvent::SpecialtyResponseUpdated {
                    specialty: "Dermatology".to_string(),
                    text: "Use sunscreen daily.".to_string(),
                },
                status("Dermatology", SpecialtyStatus::Completed),
                ConsultEvent::StreamEnded,
            ]
        );
    }

    #[test]
    fn test_transport_failure_stops_processing() {
        let mut interp = StreamInterpreter::new();
        let before = interp.feed(b"Processing consultation for Cardiology...\nconsultation:\nPartial");
        assert_eq!(before, vec![status("Cardiology", SpecialtyStatus::Consulting)]);
        assert!(!interp.is_closed());

        let failed = interp.fail("connection reset");
        assert!(interp.is_closed());
        assert_eq!(
            failed,
            vec![ConsultEvent::StreamFailed {
                reason: "connection reset".to_string()
            }]
        );

        assert!(interp.feed(b" text\nCompiling final response...\n").is_empty());
        assert!(interp.finish().is_empty());
        assert!(interp.fail("again").is_empty());
    }

    #[test]
    fn test_completed_specialty_is_not_reopened() {
        let events = run_lines(&[
            "Processing consultation for Cardiology...",
            "Processing consultation for Neurology...",
            "Processing consultation for Cardiology...",
            "consultation:",
            "Ignored text.",
        ]);

        let cardiology: Vec<_> = events
            .iter()
            .filter(|e| {
                matches!(e, ConsultEvent::SpecialtyStatusChanged { specialty, .. } if specialty == "Cardiology")
            })
            .collect();
        assert_eq!(cardiology.len(), 2);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ConsultEvent::SpecialtyResponseUpdated { .. })));
    }

    #[test]
    fn test_header_remainder_is_discarded_and_label_stripped() {
        let events = run_lines(&[
            "Processing consultation for Sleep...",
            "Sleep consultation: this header text is dropped",
            "Consultation:   Keep a regular schedule.  ",
        ]);

        assert!(events.contains(&ConsultEvent::SpecialtyResponseUpdated {
            specialty: "Sleep".to_string(),
            text: "Keep a regular schedule.".to_string(),
        }));
    }

    #[test]
    fn test_blank_and_unknown_lines_are_ignored() {
        let events = run_lines(&["", "   ", "Error: Failed to initialize RAG for Sleep", "\r"]);
        assert_eq!(events, vec![ConsultEvent::StreamEnded]);
    }

    #[test]
    fn test_crlf_and_trailing_partial_line() {
        let events = run(&[b"Final Response: Done.\r\nStill going"]);
        assert_eq!(
            events.last(),
            Some(&ConsultEvent::StreamEnded),
        );
        assert!(events.contains(&ConsultEvent::FinalAnswerUpdated {
            text: "Done.\nStill going".to_string()
        }));
    }

    #[test]
    fn test_compiling_marker_flushes_and_changes_stage() {
        let events = run_lines(&[
            "Processing consultation for Nutrition...",
            "Compiling final response...",
        ]);
        assert_eq!(
            events,
            vec![
                status("Nutrition", SpecialtyStatus::Consulting),
                status("Nutrition", SpecialtyStatus::Completed),
                ConsultEvent::StageChanged {
                    stage: Stage::FinalAnalysis
                },
                ConsultEvent::StreamEnded,
            ]
        );
    }

    #[test]
    fn test_duplicate_specialties_are_collapsed() {
        let events = run_lines(&["Specialties determined: Sleep, , Sleep ,Nutrition"]);
        assert_eq!(
            events[0],
            ConsultEvent::SpecialtiesDiscovered {
                specialties: vec!["Sleep".to_string(), "Nutrition".to_string()]
            }
        );
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("  CONSULTATION: text "), "text");
        assert_eq!(clean_response("plain"), "plain");
        assert_eq!(clean_response("çonsultation"), "çonsultation");
    }
}
