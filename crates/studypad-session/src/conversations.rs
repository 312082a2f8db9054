//! Conversations feature binding
//!
//! Observable collection of the owner's chats plus the message operations
//! the conversation view calls. Messages are read per chat on demand; the
//! chat list is the reactive collection, refreshed after every sync pass.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use studypad_core::domain::{Chat, ChatUpdate, EntityId, Message, OwnerId};
use studypad_core::ports::LocalStore;
use studypad_core::usecases::{retry_entity, ChatHelper, HelperError, MessageHelper};
use studypad_sync::{MutationSignal, SyncEngine, SyncError, SyncOutcome, SyncPhase};

/// Reactive binding for the conversations feature
pub struct ConversationsHandle {
    owner: OwnerId,
    chats_helper: ChatHelper,
    messages_helper: MessageHelper,
    store: Arc<dyn LocalStore>,
    engine: Arc<SyncEngine>,
    signal: MutationSignal,
    chats: Arc<watch::Sender<Vec<Chat>>>,
}

impl ConversationsHandle {
    /// Loads the owner's chats from the local store and starts the refresh
    /// task that follows the sync engine's passes
    pub async fn new(
        owner: OwnerId,
        store: Arc<dyn LocalStore>,
        engine: Arc<SyncEngine>,
        signal: MutationSignal,
    ) -> Result<Self, HelperError> {
        let chats_helper = ChatHelper::new(store.clone());
        let messages_helper = MessageHelper::new(store.clone());
        let initial = chats_helper.list(&owner).await?;
        let (chats, _) = watch::channel(initial);

        let handle = Self {
            owner,
            chats_helper,
            messages_helper,
            store,
            engine,
            signal,
            chats: Arc::new(chats),
        };
        handle.spawn_refresh_task();
        Ok(handle)
    }

    fn spawn_refresh_task(&self) {
        let store = self.store.clone();
        let owner = self.owner.clone();
        let chats = self.chats.clone();
        let mut phase_rx = self.engine.phase();

        tokio::spawn(async move {
            let helper = ChatHelper::new(store);
            loop {
                if phase_rx.changed().await.is_err() {
                    break;
                }
                if *phase_rx.borrow_and_update() != SyncPhase::Idle {
                    continue;
                }
                match helper.list(&owner).await {
                    Ok(list) => {
                        debug!(chats = list.len(), "refreshed chats after sync pass");
                        chats.send_replace(list);
                    }
                    Err(err) => warn!(error = %err, "failed to refresh chats after sync"),
                }
            }
        });
    }

    // --- Observable state ---

    /// The observable chats collection, newest first
    pub fn subscribe_chats(&self) -> watch::Receiver<Vec<Chat>> {
        self.chats.subscribe()
    }

    /// True while a sync pass is in flight
    pub fn is_syncing(&self) -> bool {
        self.engine.is_syncing()
    }

    /// Observable sync pass phase
    pub fn sync_phase(&self) -> watch::Receiver<SyncPhase> {
        self.engine.phase()
    }

    // --- Chat mutations ---

    /// Creates a chat; visible in the collection before any network call
    pub async fn create_chat(
        &self,
        name: impl Into<String>,
        participants: Vec<String>,
    ) -> Result<Chat, HelperError> {
        let chat = self
            .chats_helper
            .create(&self.owner, name, participants)
            .await?;
        self.chats.send_modify(|list| list.insert(0, chat.clone()));
        self.signal.notify();
        Ok(chat)
    }

    /// Applies a partial update (rename, participant change) to a chat
    pub async fn update_chat(
        &self,
        id: &EntityId,
        update: ChatUpdate,
    ) -> Result<Chat, HelperError> {
        let chat = self.chats_helper.update(id, update).await?;
        self.merge_chat(chat.clone());
        self.signal.notify();
        Ok(chat)
    }

    /// Deletes a chat together with its messages
    pub async fn delete_chat(&self, id: &EntityId) -> Result<(), HelperError> {
        self.chats_helper.delete(id).await?;
        self.chats.send_modify(|list| list.retain(|c| c.id() != id));
        self.signal.notify();
        Ok(())
    }

    // --- Message operations ---

    /// All messages of one chat, newest first; reads the local store only
    pub async fn messages_for(&self, chat_id: &EntityId) -> Result<Vec<Message>, HelperError> {
        self.messages_helper.list_for_chat(&self.owner, chat_id).await
    }

    /// Sends a message into a chat
    pub async fn send_message(
        &self,
        chat_id: &EntityId,
        body: impl Into<String>,
        attachments: Vec<String>,
    ) -> Result<Message, HelperError> {
        let message = self
            .messages_helper
            .send(&self.owner, chat_id, body, attachments)
            .await?;
        self.signal.notify();
        Ok(message)
    }

    /// Advances a message's status to read; repeated calls are no-ops
    pub async fn mark_as_read(&self, message_id: &EntityId) -> Result<Message, HelperError> {
        let message = self.messages_helper.mark_as_read(message_id).await?;
        self.signal.notify();
        Ok(message)
    }

    /// Deletes a message
    pub async fn delete_message(&self, message_id: &EntityId) -> Result<(), HelperError> {
        self.messages_helper.delete(message_id).await?;
        self.signal.notify();
        Ok(())
    }

    /// Case-insensitive substring search over message bodies
    pub async fn search_messages(&self, query: &str) -> Result<Vec<Message>, HelperError> {
        use studypad_core::domain::{EntityKind, StoredEntity};
        let records = self
            .store
            .search(EntityKind::Message, &self.owner, query)
            .await?;
        records
            .iter()
            .map(|r| Message::from_record(r).map_err(HelperError::from))
            .collect()
    }

    /// Re-arms delivery for an entity stuck in `sync_status = error`
    pub async fn retry(&self, id: &EntityId) -> Result<(), HelperError> {
        retry_entity(&self.store, id).await?;
        self.signal.notify();
        Ok(())
    }

    /// Runs a sync pass immediately and refreshes the chat list
    pub async fn force_sync_now(&self) -> Result<SyncOutcome, SyncError> {
        let outcome = self.engine.sync().await?;
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "failed to refresh chats after forced sync");
        }
        Ok(outcome)
    }

    /// Reloads the chat list from the local store
    pub async fn refresh(&self) -> Result<(), HelperError> {
        let list = self.chats_helper.list(&self.owner).await?;
        self.chats.send_replace(list);
        Ok(())
    }

    /// Replaces a chat in the observable collection, keeping its position
    fn merge_chat(&self, chat: Chat) {
        self.chats.send_modify(|list| {
            let id = *chat.id();
            match list.iter_mut().find(|c| *c.id() == id) {
                Some(slot) => *slot = chat,
                None => list.insert(0, chat),
            }
        });
    }
}
