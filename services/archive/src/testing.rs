//! services/archive/src/testing.rs
//!
//! In-memory implementations of the remote ports, for unit tests.

use async_trait::async_trait;
use book_archive_core::domain::{AuthSession, Document, NewDocument, Role, SessionUser};
use book_archive_core::ports::{
    AuthService, AuthStateStream, DocumentStore, ListOptions, PortError, PortResult,
};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

//=========================================================================================
// Document Store
//=========================================================================================

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<Vec<Document>>,
    next_id: Mutex<i64>,
    fail_next: Mutex<Option<PortError>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    /// Seeds a document, each one a minute older than the previous.
    pub fn seed(&self, title: &str, author: &str, summary: Option<&str>, content: &str) -> Document {
        self.seed_owned(title, author, summary, content, None)
    }

    pub fn seed_owned(
        &self,
        title: &str,
        author: &str,
        summary: Option<&str>,
        content: &str,
        owner_id: Option<Uuid>,
    ) -> Document {
        let mut documents = self.documents.lock().unwrap();
        let id = self.take_id();
        let document = Document {
            id,
            title: title.into(),
            author: author.into(),
            summary: summary.map(str::to_string),
            content: content.into(),
            created_at: Utc::now() - Duration::minutes(id),
            updated_at: None,
            owner_id,
        };
        documents.push(document.clone());
        document
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: PortError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub fn snapshot(&self) -> Vec<Document> {
        self.documents.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn take_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        id
    }

    fn enter(&self, call: &'static str) -> PortResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.fail_next.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list_documents(&self, options: ListOptions) -> PortResult<Vec<Document>> {
        self.enter("list")?;
        let mut documents = self.snapshot();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = options.limit {
            documents.truncate(limit.max(0) as usize);
        }
        Ok(documents)
    }

    async fn get_document(&self, id: i64) -> PortResult<Document> {
        self.enter("get")?;
        self.snapshot()
            .into_iter()
            .find(|doc| doc.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", id)))
    }

    async fn insert_document(
        &self,
        document: NewDocument,
        owner_id: Option<Uuid>,
    ) -> PortResult<Document> {
        self.enter("insert")?;
        let created = Document {
            id: self.take_id(),
            title: document.title,
            author: document.author,
            summary: document.summary,
            content: document.content,
            created_at: Utc::now(),
            updated_at: None,
            owner_id,
        };
        self.documents.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_document(&self, id: i64, document: NewDocument) -> PortResult<Document> {
        self.enter("update")?;
        let mut documents = self.documents.lock().unwrap();
        let existing = documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Book {} not found", id)))?;
        existing.title = document.title;
        existing.author = document.author;
        existing.summary = document.summary;
        existing.content = document.content;
        existing.updated_at = Some(Utc::now());
        Ok(existing.clone())
    }

    async fn delete_document(&self, id: i64) -> PortResult<()> {
        self.enter("delete")?;
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|doc| doc.id != id);
        if documents.len() == before {
            return Err(PortError::NotFound(format!("Book {} not found", id)));
        }
        Ok(())
    }

    async fn upsert_documents(&self, incoming: &[Document]) -> PortResult<usize> {
        self.enter("upsert")?;
        let mut documents = self.documents.lock().unwrap();
        for document in incoming {
            match documents.iter_mut().find(|doc| doc.id == document.id) {
                Some(existing) => *existing = document.clone(),
                None => documents.push(document.clone()),
            }
        }
        Ok(incoming.len())
    }
}

//=========================================================================================
// Auth Service
//=========================================================================================

pub struct MemoryAuthService {
    users: Mutex<HashMap<String, (String, SessionUser)>>,
    current: Mutex<Option<AuthSession>>,
    fail_session: Mutex<Option<PortError>>,
    events: broadcast::Sender<Option<AuthSession>>,
}

impl MemoryAuthService {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            users: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            fail_session: Mutex::new(None),
            events,
        }
    }

    pub fn add_user(&self, email: &str, password: &str, role: Role) -> SessionUser {
        let user = SessionUser::new(Uuid::new_v4(), email, role);
        self.users
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user.clone()));
        user
    }

    /// Makes the next `current_session` call fail with `error`.
    pub fn fail_next_session(&self, error: PortError) {
        *self.fail_session.lock().unwrap() = Some(error);
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.current.lock().unwrap().clone()
    }

    fn open(&self, user: SessionUser) -> AuthSession {
        let session = AuthSession {
            id: Uuid::new_v4().to_string(),
            user,
            issued_at: Utc::now(),
        };
        *self.current.lock().unwrap() = Some(session.clone());
        let _ = self.events.send(Some(session.clone()));
        session
    }
}

#[async_trait]
impl AuthService for MemoryAuthService {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        if self.users.lock().unwrap().contains_key(email) {
            return Err(PortError::rejected("User already registered"));
        }
        let user = self.add_user(email, password, Role::Member);
        Ok(self.open(user))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let user = match self.users.lock().unwrap().get(email) {
            Some((stored, user)) if stored == password => user.clone(),
            _ => {
                return Err(PortError::Rejected {
                    message: "Invalid email or password".into(),
                    status: Some(400),
                })
            }
        };
        Ok(self.open(user))
    }

    async fn sign_out(&self) -> PortResult<()> {
        *self.current.lock().unwrap() = None;
        let _ = self.events.send(None);
        Ok(())
    }

    async fn current_session(&self) -> PortResult<Option<AuthSession>> {
        if let Some(error) = self.fail_session.lock().unwrap().take() {
            return Err(error);
        }
        Ok(self.current())
    }

    fn subscribe(&self) -> AuthStateStream {
        let receiver = self.events.subscribe();
        Box::pin(futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.ok().map(|event| (event, receiver))
        }))
    }
}
