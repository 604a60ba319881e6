//! Impure I/O operations for the MQTT driver
//!
//! Connects through rumqttc, waits for the broker's ConnAck, then hands the
//! event loop to a background task that keeps the connection serviced and
//! flags it dead once the broker goes away.

use super::connection::{configure_mqtt_options, BrokerAddress};
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::{AsyncClient, Event, EventLoop};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request channel capacity handed to rumqttc
const CLIENT_CAPACITY: usize = 10;

/// MQTT v5 transport driver
#[derive(Debug, Clone)]
pub struct MqttTransport {
    capacity: usize,
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self {
            capacity: CLIENT_CAPACITY,
        }
    }
}

impl MqttTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll until the broker acknowledges the connection.
    /// Any error before the ConnAck fails the attempt; retrying is the dialer's job.
    async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), TransportError> {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                Ok(event) => {
                    debug!(target: "mqtt_transport", "MQTT event before ConnAck: {:?}", event);
                }
                Err(e) => return Err(TransportError::ConnectFailed(e.to_string())),
            }
        }
    }

    /// Keep the event loop serviced until the connection drops
    async fn drive_event_loop(
        connection_id: Uuid,
        mut event_loop: EventLoop,
        alive_tx: watch::Sender<bool>,
    ) {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::Disconnect(_))) => {
                    warn!(%connection_id, "MQTT broker disconnected client");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(%connection_id, "MQTT event loop error: {}", e);
                    break;
                }
            }
        }
        alive_tx.send_replace(false);
        info!(%connection_id, "MQTT event loop stopped");
    }
}

#[async_trait]
impl Transport for MqttTransport {
    type Connection = MqttConnection;
    type Session = MqttSession;

    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<MqttConnection, TransportError> {
        let address = BrokerAddress::parse(host)?;
        let mqtt_options = configure_mqtt_options(&address, user, password);
        let (client, mut event_loop) = AsyncClient::new(mqtt_options, self.capacity);

        Self::wait_for_connack(&mut event_loop).await?;

        let id = Uuid::new_v4();
        let (alive_tx, alive_rx) = watch::channel(true);
        let driver = tokio::spawn(Self::drive_event_loop(id, event_loop, alive_tx));
        info!(connection_id = %id, host = %address.host, port = address.port, "MQTT connection established");

        Ok(MqttConnection {
            id,
            client,
            alive: alive_rx,
            driver,
        })
    }

    async fn open_session(&self, connection: &MqttConnection) -> Result<MqttSession, TransportError> {
        if !connection.is_alive() {
            return Err(TransportError::Closed);
        }

        Ok(MqttSession {
            id: Uuid::new_v4(),
            connection_id: connection.id,
            client: connection.client.clone(),
        })
    }
}

/// Live connection to an MQTT broker
#[derive(Debug)]
pub struct MqttConnection {
    id: Uuid,
    client: AsyncClient,
    alive: watch::Receiver<bool>,
    driver: JoinHandle<()>,
}

impl MqttConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// False once the event loop has stopped
    pub fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    /// Resolves when the connection goes dead
    pub async fn closed(&self) {
        let mut alive = self.alive.clone();
        while *alive.borrow_and_update() {
            if alive.changed().await.is_err() {
                break;
            }
        }
    }

    /// Politely disconnect from the broker
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        // Can't disconnect asynchronously here; stopping the driver closes the socket
        self.driver.abort();
    }
}

/// Session opened on an [`MqttConnection`]; shares the connection's client
#[derive(Debug, Clone)]
pub struct MqttSession {
    id: Uuid,
    connection_id: Uuid,
    client: AsyncClient,
}

impl MqttSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Client handle for message traffic on this session
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }
}
