//! Handlers for host control messages.

use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{info, warn};
use uartnic_frame::{Message, TOKEN_LEN};
use uartnic_transport::StationConfig;

use crate::bridge::Bridge;
use crate::softap::{alive, REBOOT_CHANNEL};

impl Bridge {
    /// Restart the station with new credentials, then re-announce the device.
    pub(crate) fn configure_station(&self, ssid: &[u8], password: &[u8]) {
        let config = StationConfig::new(ssid, password);
        info!(?config, "reconfiguring station");
        if let Err(err) = self.radio.configure_station(&config) {
            warn!(error = %err, "failed to reconfigure station");
        }
        self.send_device_info();
    }

    /// Answer a link query from the driver's association state.
    pub(crate) fn report_link_status(&self) {
        let up = self.radio.current_association().is_ok();
        self.health.set_associated(up);
        info!(up, "reporting link status");
        self.uplink
            .send_logged(&Message::LinkStatus { up }, &self.stats);
    }

    /// Replace the resync token for both directions.
    pub(crate) fn set_resync_token(&self, token: [u8; TOKEN_LEN]) {
        info!(token = ?token, "resync token changed");
        self.token.set(token);
    }

    /// Handle `StartAccessPoint`: reboot, or switch to the diagnostic
    /// access point. Breaks the read loop only for a reboot.
    pub(crate) fn request_access_point(self: &Arc<Self>, channel: u8) -> ControlFlow<()> {
        self.send_alive(alive::REQUEST_RECEIVED);
        if channel == REBOOT_CHANNEL {
            info!("reboot requested");
            self.radio.restart();
            return ControlFlow::Break(());
        }
        self.start_access_point(channel);
        ControlFlow::Continue(())
    }
}
