//! Device handles and notification events from the native layer.

use std::ffi::c_void;

/// Opaque token identifying a handheld device, owned by the native layer.
///
/// The handle is borrowed for the duration of one notification callback or
/// session pipeline. It is invalid before `connect` and after `disconnect`,
/// and must never be retained across event boundaries. The type contains a
/// raw pointer and is therefore `!Send`/`!Sync`, which makes accidental
/// retention across threads a compile error.
///
/// Device identity is compared only via the recovered hardware identifier,
/// never via the handle itself (the native layer may reuse pointers).
#[derive(Debug, Clone, Copy)]
pub struct DeviceHandle(*mut c_void);

impl DeviceHandle {
    /// Wrap a raw device pointer received from the native layer.
    ///
    /// The caller guarantees the pointer stays valid for the current
    /// notification event only.
    pub fn from_raw(raw: *mut c_void) -> Self {
        Self(raw)
    }

    /// The raw pointer, for handing back to native calls.
    pub fn as_raw(self) -> *mut c_void {
        self.0
    }
}

/// What a notification event reports about a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Device attached or its pairing state became usable.
    Connected,
    /// Device detached; its handle becomes unreliable immediately.
    Disconnected,
    /// The subscription itself ended. Advisory only; no resubscription
    /// is attempted.
    Unsubscribed,
}

impl NotificationKind {
    /// Decode the raw native message code. Unknown codes yield `None` and
    /// are ignored by the pipeline.
    pub fn from_message(message: u32) -> Option<Self> {
        match message {
            1 => Some(NotificationKind::Connected),
            2 => Some(NotificationKind::Disconnected),
            3 => Some(NotificationKind::Unsubscribed),
            _ => None,
        }
    }
}

/// A decoded attach/detach/unsubscribe notification.
#[derive(Debug, Clone, Copy)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub handle: DeviceHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_codes_decode() {
        assert_eq!(NotificationKind::from_message(1), Some(NotificationKind::Connected));
        assert_eq!(NotificationKind::from_message(2), Some(NotificationKind::Disconnected));
        assert_eq!(NotificationKind::from_message(3), Some(NotificationKind::Unsubscribed));
    }

    #[test]
    fn unknown_message_codes_are_ignored() {
        assert_eq!(NotificationKind::from_message(0), None);
        assert_eq!(NotificationKind::from_message(4), None);
        assert_eq!(NotificationKind::from_message(u32::MAX), None);
    }

    #[test]
    fn handle_round_trips_raw_pointer() {
        let raw = 0x1000usize as *mut std::ffi::c_void;
        let handle = DeviceHandle::from_raw(raw);
        assert_eq!(handle.as_raw(), raw);
    }
}
