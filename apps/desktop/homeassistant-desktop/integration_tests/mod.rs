mod app;
mod tray_state;
