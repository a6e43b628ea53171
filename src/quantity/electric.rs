quantity!(Amperes, "A");

quantity!(Volts, "V");
