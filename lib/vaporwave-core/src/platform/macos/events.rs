use crate::platform::macos::MacOSPlatform;
use crate::platform::{
    EngineEvent, EventDispatcher, PlatformEventsImpl, PlatformResult, ProcessId,
};
use block2::RcBlock;
use log::trace;
use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_app_kit::{
    NSApplicationDidChangeScreenParametersNotification, NSRunningApplication, NSWorkspace,
    NSWorkspaceActiveSpaceDidChangeNotification, NSWorkspaceApplicationKey,
    NSWorkspaceDidActivateApplicationNotification,
};
use objc2_foundation::{
    NSNotification, NSNotificationCenter, NSNotificationName, NSObjectProtocol, NSOperationQueue,
};
use std::ptr::NonNull;

type Observer = Retained<ProtocolObject<dyn NSObjectProtocol>>;

impl PlatformEventsImpl for MacOSPlatform {
    /// Must be called on the main thread. Handlers run on the main queue.
    fn start(&self, dispatcher: EventDispatcher) -> PlatformResult<()> {
        let observers = unsafe {
            let workspace_center = NSWorkspace::sharedWorkspace().notificationCenter();
            let default_center = NSNotificationCenter::defaultCenter();

            let activated = dispatcher.clone();
            let space = dispatcher.clone();
            let screens = dispatcher;

            vec![
                observe(
                    &workspace_center,
                    NSWorkspaceDidActivateApplicationNotification,
                    move |notification| {
                        if let Some(pid) = activated_pid(notification) {
                            activated.send(EngineEvent::ApplicationActivated(pid));
                        }
                    },
                ),
                observe(
                    &workspace_center,
                    NSWorkspaceActiveSpaceDidChangeNotification,
                    move |_| space.send(EngineEvent::ActiveSpaceChanged),
                ),
                observe(
                    &default_center,
                    NSApplicationDidChangeScreenParametersNotification,
                    move |_| screens.send(EngineEvent::DisplaysReconfigured),
                ),
            ]
        };

        trace!("Registered {} notification observers", observers.len());
        // Observers stay registered for the rest of the process
        std::mem::forget(observers);
        Ok(())
    }

    fn requires_main_loop(&self) -> bool {
        true
    }
}

fn observe(
    center: &NSNotificationCenter,
    name: &NSNotificationName,
    handler: impl Fn(&NSNotification) + 'static,
) -> Observer {
    let block = RcBlock::new(move |notification: NonNull<NSNotification>| {
        handler(unsafe { notification.as_ref() });
    });

    unsafe {
        center.addObserverForName_object_queue_usingBlock(
            Some(name),
            None,
            Some(&NSOperationQueue::mainQueue()),
            &block,
        )
    }
}

fn activated_pid(notification: &NSNotification) -> Option<ProcessId> {
    unsafe {
        let user_info = notification.userInfo()?;
        let app = user_info.objectForKey(NSWorkspaceApplicationKey)?;
        let app = app.downcast::<NSRunningApplication>().ok()?;
        let pid = app.processIdentifier();
        (pid > 0).then_some(pid as ProcessId)
    }
}
