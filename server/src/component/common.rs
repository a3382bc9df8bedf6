use async_trait::async_trait;
use quiznet_core::error::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

const PORT_DEPTH: usize = 32;

/// A data represent the reason of closing.
#[derive(Debug, Clone)]
pub enum CloseReason {
    Complete,
    Fault(Error),
}

/// The channels a started component leaves behind for its owner.
pub struct PortsHandle<I, O> {
    input_tx: Option<mpsc::Sender<I>>,
    output_rx: Option<mpsc::Receiver<O>>,
    close_rx: Option<oneshot::Receiver<CloseReason>>,
}

impl<I, O> PortsHandle<I, O> {
    /// An empty handle, the placeholder left once the real one has
    /// been taken for waiting.
    pub fn drained() -> Self {
        Self {
            input_tx: None,
            output_rx: None,
            close_rx: None,
        }
    }

    /// The input channel of the component, when it accepts input.
    pub fn input(&self) -> Option<mpsc::Sender<I>> {
        self.input_tx.clone()
    }

    /// Take the output channel.  A closed output channel means the
    /// component has stopped.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<O>> {
        self.output_rx.take()
    }

    pub async fn wait(&mut self) -> CloseReason {
        let Some(rx) = self.close_rx.take() else {
            panic!("Somewhere else is waiting already");
        };
        match rx.await {
            Ok(reason) => {
                if let CloseReason::Fault(ref e) = reason {
                    error!("Component closed with fault: {}", e);
                }
                reason
            }
            Err(_) => CloseReason::Complete,
        }
    }
}

/// A set of channels attached to a running component.
pub trait Ports: Send + Sized + 'static {
    type Handle: Send;

    fn create() -> (Self, Self::Handle);

    fn close(self, reason: CloseReason);
}

/// Ports of a component that only consumes frames.
pub struct ConsumerPorts<I> {
    rx: mpsc::Receiver<I>,
    close: oneshot::Sender<CloseReason>,
}

impl<I> ConsumerPorts<I> {
    pub async fn recv(&mut self) -> Option<I> {
        self.rx.recv().await
    }
}

impl<I: Send + 'static> Ports for ConsumerPorts<I> {
    type Handle = PortsHandle<I, ()>;

    fn create() -> (Self, Self::Handle) {
        let (input_tx, input_rx) = mpsc::channel(PORT_DEPTH);
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                rx: input_rx,
                close: close_tx,
            },
            PortsHandle {
                input_tx: Some(input_tx),
                output_rx: None,
                close_rx: Some(close_rx),
            },
        )
    }

    fn close(self, reason: CloseReason) {
        if self.close.send(reason).is_err() {
            warn!("Failed to send close reason");
        }
    }
}

/// Ports of a component that consumes one frame type and produces
/// another.
pub struct PipelinePorts<I, O> {
    rx: mpsc::Receiver<I>,
    tx: mpsc::Sender<O>,
    close: oneshot::Sender<CloseReason>,
}

impl<I, O> PipelinePorts<I, O> {
    pub async fn recv(&mut self) -> Option<I> {
        self.rx.recv().await
    }

    pub async fn send(&self, frame: O) {
        if self.tx.send(frame).await.is_err() {
            warn!("Send error: output channel closed");
        }
    }
}

impl<I: Send + 'static, O: Send + 'static> Ports for PipelinePorts<I, O> {
    type Handle = PortsHandle<I, O>;

    fn create() -> (Self, Self::Handle) {
        let (input_tx, input_rx) = mpsc::channel(PORT_DEPTH);
        let (output_tx, output_rx) = mpsc::channel(PORT_DEPTH);
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                rx: input_rx,
                tx: output_tx,
                close: close_tx,
            },
            PortsHandle {
                input_tx: Some(input_tx),
                output_rx: Some(output_rx),
                close_rx: Some(close_rx),
            },
        )
    }

    fn close(self, reason: CloseReason) {
        if self.close.send(reason).is_err() {
            warn!("Failed to send close reason");
        }
    }
}

#[async_trait]
pub trait Component<P, C>
where
    P: Ports,
    C: Send + 'static,
{
    fn name() -> &'static str;

    fn start(context: C) -> P::Handle {
        info!("Starting component: {}", Self::name());
        let (ports, handle) = P::create();
        tokio::spawn(async move {
            Self::run(ports, context).await;
        });
        handle
    }

    async fn run(ports: P, context: C);
}
