use std::sync::Arc;

use quiznet_core::accounts::{load_accounts, AccountStore, FileSink};
use quiznet_core::bank::QuestionBank;
use quiznet_core::error::{Error, Result};
use quiznet_env::Config;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::frame::SignalFrame;
use crate::hub::ClientHub;
use crate::session::SessionManager;

/// Server runtime context
pub struct ApplicationContext {
    pub config: Config,
    pub accounts: AccountStore,
    pub bank: Arc<QuestionBank>,
    pub hub: Arc<ClientHub>,
    pub sessions: Arc<SessionManager>,
    signal_tx: mpsc::Sender<SignalFrame>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApplicationContext {
    pub async fn try_new_and_start_signal_loop(config: Config) -> Result<(Self, JoinHandle<()>)> {
        info!("Initialize application context");

        let records = load_accounts(&config.accounts_file).await?;
        let accounts =
            AccountStore::new(records, Box::new(FileSink::new(&config.accounts_file)));

        let bank = Arc::new(QuestionBank::from_file(&config.bank_file).await?);
        if bank.is_empty() {
            return Err(Error::MalformedBank("the question bank is empty".into()));
        }

        let hub = Arc::new(ClientHub::new());
        let sessions = Arc::new(SessionManager::default());

        let (signal_tx, signal_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ctx = Self {
            config,
            accounts,
            bank,
            hub,
            sessions,
            signal_tx,
            shutdown_rx,
        };

        let join_handle = ctx.start_signal_loop(signal_rx, shutdown_tx);

        Ok((ctx, join_handle))
    }

    fn start_signal_loop(
        &self,
        mut signal_rx: mpsc::Receiver<SignalFrame>,
        shutdown_tx: watch::Sender<bool>,
    ) -> JoinHandle<()> {
        info!("Starting signal loop");

        let sessions = self.sessions.clone();
        let hub = self.hub.clone();

        tokio::spawn(async move {
            while let Some(signal) = signal_rx.recv().await {
                match signal {
                    SignalFrame::RemoveSession { session_id } => {
                        sessions.remove_session(session_id).await;
                        hub.clear_session_members(session_id).await;
                    }
                    SignalFrame::Shutdown => {
                        sessions.shutdown().await;
                        hub.close_all().await;
                        if shutdown_tx.send(true).is_err() {
                            // No one is listening anymore.
                        }
                        break;
                    }
                }
            }
            info!("Signal loop stopped");
        })
    }

    pub fn signal_sender(&self) -> mpsc::Sender<SignalFrame> {
        self.signal_tx.clone()
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }
}
