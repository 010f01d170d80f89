//! Client workflow: form, preview set, detail and refinement.
//!
//! [`State::on`] is the pure transition table; [`Workflow`] drives it
//! against the retrieval API and persists the session after every step.

use std::fmt;
use tracing::{debug, info, warn};
use wayfarer_store::{Key, TripRequest};

use crate::preview::PreviewBody;
use crate::{ApiClient, ItineraryView, Preview, Session, SessionStore, SubmitResponse, WorkflowError};

/// Candidate itineraries shown after a submission.
pub const PREVIEW_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Form,
    Submitting,
    PreviewSet { keys: Vec<i64> },
    Detail { key: i64, keys: Vec<i64> },
    Refining { key: i64, keys: Vec<i64> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Submit,
    SubmitSucceeded { key: Key },
    SubmitFailed,
    Select(i64),
    Back,
    Regenerate(i64),
    Refine(String),
    Refined,
    RefineFailed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form => write!(f, "the trip form"),
            Self::Submitting => write!(f, "a pending submission"),
            Self::PreviewSet { .. } => write!(f, "the preview set"),
            Self::Detail { key, .. } => write!(f, "the detail of itinerary {key}"),
            Self::Refining { key, .. } => write!(f, "a refinement of itinerary {key}"),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => write!(f, "submit a trip"),
            Self::SubmitSucceeded { .. } => write!(f, "finish a submission"),
            Self::SubmitFailed => write!(f, "fail a submission"),
            Self::Select(key) => write!(f, "select itinerary {key}"),
            Self::Back => write!(f, "go back"),
            Self::Regenerate(key) => write!(f, "regenerate itinerary {key}"),
            Self::Refine(_) => write!(f, "refine"),
            Self::Refined => write!(f, "finish a refinement"),
            Self::RefineFailed => write!(f, "fail a refinement"),
        }
    }
}

impl State {
    /// Next state for `event`. An invalid pair is an error and the
    /// caller keeps its current state.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] naming both sides.
    pub fn on(&self, event: &Event) -> Result<Self, WorkflowError> {
        let next = match (self, event) {
            (Self::Form, Event::Submit) => Self::Submitting,
            (Self::Submitting, Event::SubmitSucceeded { key }) => Self::PreviewSet {
                keys: preview_keys(*key, PREVIEW_COUNT),
            },
            (Self::Submitting, Event::SubmitFailed) => Self::Form,
            (Self::PreviewSet { keys }, Event::Select(key)) => Self::Detail {
                key: *key,
                keys: keys.clone(),
            },
            (Self::PreviewSet { keys }, Event::Regenerate(target)) if keys.contains(target) => {
                self.clone()
            }
            (Self::Detail { key, .. }, Event::Regenerate(target)) if key == target => self.clone(),
            (Self::Detail { keys, .. }, Event::Back) => Self::PreviewSet { keys: keys.clone() },
            (Self::Detail { key, keys }, Event::Refine(_)) => Self::Refining {
                key: *key,
                keys: keys.clone(),
            },
            (Self::Refining { key, keys }, Event::Refined | Event::RefineFailed) => Self::Detail {
                key: *key,
                keys: keys.clone(),
            },
            _ => {
                return Err(WorkflowError::InvalidTransition {
                    state: self.to_string(),
                    event: event.to_string(),
                });
            }
        };
        Ok(next)
    }

    #[must_use]
    pub fn preview_keys(&self) -> Option<&[i64]> {
        match self {
            Self::PreviewSet { keys } | Self::Detail { keys, .. } | Self::Refining { keys, .. } => {
                Some(keys)
            }
            Self::Form | Self::Submitting => None,
        }
    }
}

/// `count` consecutive keys ending at `submitted`, starting no lower
/// than 0. A first submission previews 0, 1 and 2.
#[must_use]
pub fn preview_keys(submitted: Key, count: usize) -> Vec<i64> {
    let start = submitted.saturating_add(1).saturating_sub(count);
    (start..start + count)
        .filter_map(|k| i64::try_from(k).ok())
        .collect()
}

pub struct Workflow {
    client: ApiClient,
    store: SessionStore,
    session: Session,
    state: State,
}

impl Workflow {
    /// A fresh workflow at the trip form. The previous session is
    /// replaced on the first save.
    #[must_use]
    pub fn start(client: ApiClient, store: SessionStore) -> Self {
        Self {
            client,
            store,
            session: Session::default(),
            state: State::Form,
        }
    }

    /// Restores the state recorded in the session file.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Session`] if the session file cannot be read.
    pub fn resume(client: ApiClient, store: SessionStore) -> Result<Self, WorkflowError> {
        let session = store.load()?;
        let state = if session.preview_keys.is_empty() {
            State::Form
        } else if let Some(key) = session.active_key {
            State::Detail {
                key,
                keys: session.preview_keys.clone(),
            }
        } else {
            State::PreviewSet {
                keys: session.preview_keys.clone(),
            }
        };
        debug!(state = %state, "Resumed client session");
        Ok(Self {
            client,
            store,
            session,
            state,
        })
    }

    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn apply(&mut self, event: &Event) -> Result<(), WorkflowError> {
        let next = self.state.on(event)?;
        debug!(from = %self.state, to = %next, "Workflow transition");
        self.state = next;
        Ok(())
    }

    fn persist(&mut self) -> Result<(), WorkflowError> {
        self.session.preview_keys = self.state.preview_keys().map(<[i64]>::to_vec).unwrap_or_default();
        self.session.active_key = match &self.state {
            State::Detail { key, .. } | State::Refining { key, .. } => Some(*key),
            _ => None,
        };
        self.store.save(&self.session)
    }

    /// Submits once. A failed submission returns to the form and is not
    /// retried.
    ///
    /// # Errors
    ///
    /// An invalid transition, the client error of a failed submission, or
    /// a session write failure.
    pub async fn submit(&mut self, request: &TripRequest) -> Result<SubmitResponse, WorkflowError> {
        self.apply(&Event::Submit)?;
        let response = match self.client.submit(request).await {
            Ok(response) => response,
            Err(e) => {
                self.apply(&Event::SubmitFailed)?;
                return Err(e.into());
            }
        };
        self.apply(&Event::SubmitSucceeded { key: response.key })?;
        self.session.submitted_key = Some(response.key);
        self.session.refinements.clear();
        self.persist()?;
        info!(key = response.key, "Trip submitted");
        Ok(response)
    }

    /// Triggers generation, then fetches each preview key on its own. A
    /// failed fetch becomes an unreadable preview rather than an error.
    ///
    /// # Errors
    ///
    /// An invalid transition when nothing was submitted, or the failure of
    /// the generation request.
    pub async fn previews(&self) -> Result<Vec<Preview>, WorkflowError> {
        let keys = self
            .state
            .preview_keys()
            .ok_or_else(|| WorkflowError::InvalidTransition {
                state: self.state.to_string(),
                event: "show previews".into(),
            })?
            .to_vec();
        self.client.itinerary_data().await?;

        let mut previews = Vec::with_capacity(keys.len());
        for key in keys {
            let preview = match self.client.itinerary(key).await {
                Ok(view) => Preview::from_view(key, &view),
                Err(e) => {
                    warn!(key, error = %e, "Preview fetch failed");
                    Preview {
                        key,
                        body: PreviewBody::Unreadable(e.to_string()),
                    }
                }
            };
            previews.push(preview);
        }
        Ok(previews)
    }

    /// # Errors
    ///
    /// An invalid transition, a client error or a session write failure.
    pub async fn select(&mut self, key: i64) -> Result<ItineraryView, WorkflowError> {
        self.apply(&Event::Select(key))?;
        self.persist()?;
        Ok(self.client.itinerary(key).await?)
    }

    /// The itinerary of the active key, when one is open.
    ///
    /// # Errors
    ///
    /// An invalid transition outside the detail view, or a client error.
    pub async fn current(&self) -> Result<ItineraryView, WorkflowError> {
        match &self.state {
            State::Detail { key, .. } => Ok(self.client.itinerary(*key).await?),
            other => Err(WorkflowError::InvalidTransition {
                state: other.to_string(),
                event: "show the open itinerary".into(),
            }),
        }
    }

    /// # Errors
    ///
    /// An invalid transition or a session write failure.
    pub fn back(&mut self) -> Result<(), WorkflowError> {
        self.apply(&Event::Back)?;
        self.persist()
    }

    /// # Errors
    ///
    /// An invalid transition or a client error.
    pub async fn regenerate(&mut self, key: i64) -> Result<ItineraryView, WorkflowError> {
        self.apply(&Event::Regenerate(key))?;
        Ok(self.client.regenerate(key).await?)
    }

    /// Refines the open itinerary. The detail view is restored whether or
    /// not the refinement succeeds.
    ///
    /// # Errors
    ///
    /// An invalid transition, the client error of a failed refinement, or
    /// a session write failure.
    pub async fn refine(&mut self, text: &str) -> Result<ItineraryView, WorkflowError> {
        let event = Event::Refine(text.to_string());
        let key = match &self.state {
            State::Detail { key, .. } => *key,
            other => {
                return Err(WorkflowError::InvalidTransition {
                    state: other.to_string(),
                    event: event.to_string(),
                });
            }
        };
        self.apply(&event)?;
        match self.client.refine(key, text).await {
            Ok(view) => {
                self.apply(&Event::Refined)?;
                self.session.refinements.push(text.to_string());
                self.persist()?;
                Ok(view)
            }
            Err(e) => {
                self.apply(&Event::RefineFailed)?;
                Err(e.into())
            }
        }
    }
}
