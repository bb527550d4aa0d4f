//! Plain terminal rendering of consultation events

use std::collections::HashMap;
use std::io::{self, Write};

use vhospital_core::chat::{ChatMessage, Role};
use vhospital_core::consult::{ConsultEvent, SpecialtyStatus};

const PENDING: &str = "⌛";
const DONE: &str = "✅";

/// Writes progress lines as events arrive and streams the final answer
pub struct EventRenderer<W: Write> {
    out: W,
    /// Print each specialist's reply when it completes
    details: bool,
    responses: HashMap<String, String>,
    /// Bytes of the final answer already written
    final_printed: usize,
    /// Final answer text is on the current output line
    line_open: bool,
}

impl<W: Write> EventRenderer<W> {
    pub fn new(out: W, details: bool) -> Self {
        Self {
            out,
            details,
            responses: HashMap::new(),
            final_printed: 0,
            line_open: false,
        }
    }

    pub fn render(&mut self, event: &ConsultEvent) -> io::Result<()> {
        match event {
            ConsultEvent::StageChanged { stage } => {
                self.close_line()?;
                writeln!(self.out, "» {}", stage)?;
            }
            ConsultEvent::SpecialtiesDiscovered { specialties } => {
                for specialty in specialties {
                    writeln!(self.out, "  {} {}", PENDING, specialty)?;
                }
            }
            ConsultEvent::NoSpecialties => {
                writeln!(self.out, "  No specialist consultation needed")?;
            }
            ConsultEvent::SpecialtyStatusChanged { specialty, status } => match status {
                SpecialtyStatus::Pending => {}
                SpecialtyStatus::Consulting => {
                    writeln!(self.out, "  {} Consulting {}...", PENDING, specialty)?;
                }
                SpecialtyStatus::Completed => {
                    writeln!(self.out, "  {} {}", DONE, specialty)?;
                    if self.details {
                        if let Some(text) = self.responses.get(specialty) {
                            for line in text.lines() {
                                writeln!(self.out, "      {}", line)?;
                            }
                        }
                    }
                }
            },
            ConsultEvent::SpecialtyResponseUpdated { specialty, text } => {
                self.responses.insert(specialty.clone(), text.clone());
            }
            ConsultEvent::FinalAnswerUpdated { text } => {
                // Updates carry the whole answer so far; write only the new tail
                if self.final_printed == 0 && !text.is_empty() {
                    writeln!(self.out)?;
                }
                if let Some(mut tail) = text.get(self.final_printed..) {
                    // A stage line already ended the previous answer line
                    if !self.line_open && self.final_printed > 0 {
                        tail = tail.strip_prefix('\n').unwrap_or(tail);
                    }
                    write!(self.out, "{}", tail)?;
                    self.line_open |= !tail.is_empty();
                    self.final_printed = text.len();
                }
            }
            ConsultEvent::StreamEnded => {}
            ConsultEvent::StreamFailed { reason } => {
                self.close_line()?;
                writeln!(self.out, "  Consultation failed: {}", reason)?;
            }
        }

        if event.is_terminal() {
            self.close_line()?;
            self.final_printed = 0;
        }
        self.out.flush()
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// One transcript entry as shown in the chat history
pub fn format_message(message: &ChatMessage) -> String {
    match message.role {
        Role::User => format!("you> {}", message.content),
        Role::Assistant => format!("hospital> {}", message.content),
    }
}
