#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditState {
    #[default]
    ReadOnly,
    Editing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditAction {
    DoubleClick,
    /// Focus left the article and the grace delay ran out.
    BlurElapsed,
    Cancel,
    Save,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditEffect {
    Nothing,
    Enter,
    Exit,
    /// Exit editing and offer the text as a download under `file_name`.
    SaveAndExit { file_name: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditSession {
    state: EditState,
}

impl EditSession {
    pub fn is_editing(&self) -> bool {
        self.state == EditState::Editing
    }

    /// Value for the article's `contenteditable` attribute.
    pub fn contenteditable(&self) -> &'static str {
        if self.is_editing() {
            "true"
        } else {
            "false"
        }
    }

    pub fn handle(&mut self, action: EditAction, document_path: &str) -> EditEffect {
        match (self.state, action) {
            (EditState::ReadOnly, EditAction::DoubleClick) => {
                self.state = EditState::Editing;
                EditEffect::Enter
            }
            (EditState::ReadOnly, _) | (EditState::Editing, EditAction::DoubleClick) => {
                EditEffect::Nothing
            }
            (EditState::Editing, EditAction::BlurElapsed | EditAction::Cancel) => {
                self.state = EditState::ReadOnly;
                EditEffect::Exit
            }
            (EditState::Editing, EditAction::Save) => {
                self.state = EditState::ReadOnly;
                EditEffect::SaveAndExit {
                    file_name: download_name(document_path).to_string(),
                }
            }
        }
    }

    /// Route changes always drop back to read-only without saving.
    pub fn reset(&mut self) {
        self.state = EditState::ReadOnly;
    }
}

/// Map a keydown to an edit action: `Ctrl+S` saves, `Escape` cancels.
pub fn key_action(key: &str, ctrl: bool) -> Option<EditAction> {
    if ctrl && key.eq_ignore_ascii_case("s") {
        Some(EditAction::Save)
    } else if key == "Escape" {
        Some(EditAction::Cancel)
    } else {
        None
    }
}

pub fn download_name(document_path: &str) -> &str {
    document_path.rsplit('/').next().unwrap_or(document_path)
}
