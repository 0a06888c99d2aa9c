#![allow(unsafe_code)]


mod hello;
mod host;
mod optimization;
